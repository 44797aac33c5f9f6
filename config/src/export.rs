//! Module exports and their unwrapping.
//!
//! A configuration module can export a plain value, a list of exports, a
//! value that is still being produced ([`ConfigExport::Deferred`]), or a
//! factory that computes the configuration from the `--env` mapping and the
//! parsed arguments. [`unwrap_export`] reduces any of these to plain JSON.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use serde_json::Value;

use crate::error::Result;

/// Factory export: invoked once with `(env, argv)`.
pub type ConfigFactory = Box<dyn FnOnce(&Value, &Value) -> ConfigExport + Send>;

/// What a configuration module exports.
pub enum ConfigExport {
    Value(Value),
    List(Vec<ConfigExport>),
    Deferred(BoxFuture<'static, Result<ConfigExport>>),
    Factory(ConfigFactory),
}

impl ConfigExport {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<ConfigExport>> + Send + 'static,
    {
        ConfigExport::Deferred(future.boxed())
    }

    pub fn factory<F>(factory: F) -> Self
    where
        F: FnOnce(&Value, &Value) -> ConfigExport + Send + 'static,
    {
        ConfigExport::Factory(Box::new(factory))
    }
}

impl From<Value> for ConfigExport {
    fn from(value: Value) -> Self {
        ConfigExport::Value(value)
    }
}

impl fmt::Debug for ConfigExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigExport::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ConfigExport::List(items) => f.debug_tuple("List").field(items).finish(),
            ConfigExport::Deferred(_) => f.write_str("Deferred(..)"),
            ConfigExport::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Arguments handed to factory exports.
#[derive(Debug, Clone, Default)]
pub struct FactoryArgs {
    /// Folded `--env` mapping.
    pub env: Value,
    /// Parsed command-line options.
    pub argv: Value,
}

/// Reduces an export to plain JSON.
///
/// Deferred exports are awaited, factories are invoked, and list elements
/// are unwrapped concurrently, recursively until a value remains.
pub fn unwrap_export(export: ConfigExport, args: Arc<FactoryArgs>) -> BoxFuture<'static, Result<Value>> {
    async move {
        match export {
            ConfigExport::Value(value) => Ok(value),
            ConfigExport::List(items) => {
                let values =
                    try_join_all(items.into_iter().map(|item| unwrap_export(item, args.clone())))
                        .await?;
                Ok(Value::Array(values))
            }
            ConfigExport::Deferred(future) => {
                let next = future.await?;
                unwrap_export(next, args).await
            }
            ConfigExport::Factory(factory) => {
                let next = factory(&args.env, &args.argv);
                unwrap_export(next, args).await
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args() -> Arc<FactoryArgs> {
        Arc::new(FactoryArgs {
            env: json!({"production": true}),
            argv: json!({"mode": "none"}),
        })
    }

    #[tokio::test]
    async fn test_plain_value() {
        let value = unwrap_export(json!({"a": 1}).into(), args()).await.unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_factory_receives_env_and_argv() {
        let export = ConfigExport::factory(|env, argv| {
            json!({"production": env["production"], "mode": argv["mode"]}).into()
        });
        let value = unwrap_export(export, args()).await.unwrap();
        assert_eq!(value, json!({"production": true, "mode": "none"}));
    }

    fn ready(value: Value) -> ConfigExport {
        ConfigExport::deferred(async move {
            let export: Result<ConfigExport> = Ok(ConfigExport::Value(value));
            export
        })
    }

    #[tokio::test]
    async fn test_deferred_factory_chain() {
        let export = ConfigExport::deferred(async {
            let export: Result<ConfigExport> =
                Ok(ConfigExport::factory(|_, _| ready(json!({"deep": true}))));
            export
        });
        let value = unwrap_export(export, args()).await.unwrap();
        assert_eq!(value, json!({"deep": true}));
    }

    #[tokio::test]
    async fn test_list_elements_unwrapped_in_order() {
        let export = ConfigExport::List(vec![
            ready(json!({"name": "a"})),
            ConfigExport::factory(|_, _| json!({"name": "b"}).into()),
            json!({"name": "c"}).into(),
        ]);
        let value = unwrap_export(export, args()).await.unwrap();
        assert_eq!(value, json!([{"name": "a"}, {"name": "b"}, {"name": "c"}]));
    }

    #[tokio::test]
    async fn test_deferred_error_propagates() {
        let export = ConfigExport::deferred(async {
            let export: Result<ConfigExport> = Err(crate::ConfigError::MissingExport {
                path: "/x".into(),
            });
            export
        });
        assert!(unwrap_export(export, args()).await.is_err());
    }
}
