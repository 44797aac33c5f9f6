use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use packcli_config::*;
use serde_json::{Value, json};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn loader(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new(dir.path(), Arc::new(FileModuleLoader::new()))
}

fn with_config(paths: &[&str]) -> LoadOptions {
    LoadOptions {
        config: paths.iter().map(|p| p.to_string()).collect(),
        ..LoadOptions::default()
    }
}

#[tokio::test]
async fn test_default_config_priority_and_stability() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "packcli.config.yaml", "mode: development\n");
    let json_path = write(dir.path(), "packcli.config.json", r#"{"mode": "production"}"#);
    write(dir.path(), ".packcli/packcli.config.json", r#"{"mode": "none"}"#);

    let loader = loader(&dir);
    assert_eq!(loader.find_default_config(), Some(json_path.clone()));
    assert_eq!(loader.find_default_config(), Some(json_path.clone()));

    let set = loader.resolve(&LoadOptions::default()).await.unwrap();
    assert!(!set.is_multiple());
    assert_eq!(set.to_value(), json!({"mode": "production"}));
    assert_eq!(set.all_paths(), vec![json_path]);
}

#[tokio::test]
async fn test_no_config_is_empty() {
    let dir = TempDir::new().unwrap();
    let set = loader(&dir).resolve(&LoadOptions::default()).await.unwrap();
    assert_eq!(set.to_value(), json!({}));
    assert!(set.all_paths().is_empty());
}

#[tokio::test]
async fn test_hidden_directory_default() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), ".packcli/packclifile.toml", "mode = \"none\"\n");
    let set = loader(&dir).resolve(&LoadOptions::default()).await.unwrap();
    assert_eq!(set.to_value(), json!({"mode": "none"}));
    assert_eq!(set.all_paths(), vec![path]);
}

#[tokio::test]
async fn test_multiple_files_keep_order() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.json", r#"{"name": "a"}"#);
    let b = write(dir.path(), "b.yml", "- name: b1\n- name: b2\n");

    let set = loader(&dir)
        .resolve(&with_config(&["a.json", "b.yml"]))
        .await
        .unwrap();
    assert!(set.is_multiple());
    assert_eq!(
        set.to_value(),
        json!([{"name": "a"}, {"name": "b1"}, {"name": "b2"}])
    );
    let entries = set.entries();
    assert_eq!(set.paths_of(&entries[0]), &[a]);
    assert_eq!(set.paths_of(&entries[2]), &[b]);
}

#[tokio::test]
async fn test_single_file_keeps_its_shape() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "only.json", r#"[{"name": "only"}]"#);
    write(dir.path(), "plain.json", r#"{"name": "plain"}"#);

    let set = loader(&dir).resolve(&with_config(&["only.json"])).await.unwrap();
    assert!(set.is_multiple());
    assert_eq!(set.to_value(), json!([{"name": "only"}]));

    let set = loader(&dir).resolve(&with_config(&["plain.json"])).await.unwrap();
    assert!(!set.is_multiple());
    assert_eq!(set.to_value(), json!({"name": "plain"}));
}

#[tokio::test]
async fn test_merge_two_files_concatenates_arrays() {
    let dir = TempDir::new().unwrap();
    let one = write(dir.path(), "one.json", r#"{"mode": "development", "plugins": ["P1"]}"#);
    let two = write(dir.path(), "two.json", r#"{"mode": "production", "plugins": ["P2"]}"#);

    let mut options = with_config(&["one.json", "two.json"]);
    options.merge = true;
    let set = loader(&dir).resolve(&options).await.unwrap();

    assert!(!set.is_multiple());
    assert_eq!(set.to_value(), json!({"mode": "production", "plugins": ["P1", "P2"]}));
    assert_eq!(set.all_paths(), vec![one, two]);
}

#[tokio::test]
async fn test_merge_single_config_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "one.json", r#"{"mode": "development"}"#);
    let mut options = with_config(&["one.json"]);
    options.merge = true;
    let error = loader(&dir).resolve(&options).await.unwrap_err();
    assert!(matches!(error, ConfigError::Merge(_)));
}

#[tokio::test]
async fn test_config_name_selection() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "multi.json",
        r#"[{"name": "client", "target": "web"}, {"name": "server", "target": "node"}]"#,
    );
    let mut options = with_config(&["multi.json"]);
    options.config_name = vec!["server".into()];
    let set = loader(&dir).resolve(&options).await.unwrap();
    assert_eq!(set.to_value(), json!([{"name": "server", "target": "node"}]));

    options.config_name = vec!["client".into(), "missing".into()];
    let error = loader(&dir).resolve(&options).await.unwrap_err();
    assert_eq!(
        error.to_string(),
        "Configuration with the name \"missing\" was not found."
    );
}

#[tokio::test]
async fn test_extends_chain_merges_base_first() {
    let dir = TempDir::new().unwrap();
    let base = write(
        dir.path(),
        "base.json",
        r#"{"mode": "production", "plugins": ["P0"], "output": {"path": "dist"}}"#,
    );
    let child = write(
        dir.path(),
        "child.json",
        r#"{"extends": "base.json", "plugins": ["P1"], "output": {"filename": "x.js"}}"#,
    );

    let set = loader(&dir).resolve(&with_config(&["child.json"])).await.unwrap();
    assert_eq!(
        set.to_value(),
        json!({
            "mode": "production",
            "plugins": ["P0", "P1"],
            "output": {"path": "dist", "filename": "x.js"}
        })
    );
    assert_eq!(set.all_paths(), vec![child, base]);
}

#[tokio::test]
async fn test_self_extends_is_recursive() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "self.json", r#"{"extends": "./self.json"}"#);
    let error = loader(&dir).resolve(&with_config(&["self.json"])).await.unwrap_err();
    assert!(matches!(error, ConfigError::RecursiveConfiguration { .. }));
}

#[tokio::test]
async fn test_mutual_extends_is_recursive() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.json", r#"{"extends": "b.json", "name": "a"}"#);
    write(dir.path(), "b.json", r#"{"extends": "a.json", "name": "b"}"#);
    let error = loader(&dir).resolve(&with_config(&["a.json"])).await.unwrap_err();
    match error {
        ConfigError::RecursiveConfiguration { path } => assert_eq!(path, a),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cli_extends_replaces_file_extends() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "file-base.json", r#"{"devtool": "eval"}"#);
    write(dir.path(), "cli-base.json", r#"{"bail": true}"#);
    write(dir.path(), "main.json", r#"{"extends": "file-base.json", "mode": "none"}"#);

    let mut options = with_config(&["main.json"]);
    options.extends = vec!["cli-base.json".into()];
    let set = loader(&dir).resolve(&options).await.unwrap();
    assert_eq!(set.to_value(), json!({"bail": true, "mode": "none"}));
}

#[tokio::test]
async fn test_extends_on_empty_default_is_tracked() {
    let dir = TempDir::new().unwrap();
    let base = write(dir.path(), "base.json", r#"{"mode": "none"}"#);
    let options = LoadOptions {
        extends: vec!["base.json".into()],
        ..LoadOptions::default()
    };
    let set = loader(&dir).resolve(&options).await.unwrap();
    assert_eq!(set.to_value(), json!({"mode": "none"}));
    assert_eq!(set.all_paths(), vec![base]);
}

#[tokio::test]
async fn test_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "bad.json", "42");
    let error = loader(&dir).resolve(&with_config(&["bad.json"])).await.unwrap_err();
    assert!(error.to_string().starts_with("Invalid configuration in"));
}

#[tokio::test]
async fn test_missing_explicit_file() {
    let dir = TempDir::new().unwrap();
    let error = loader(&dir)
        .resolve(&with_config(&["nope.json"]))
        .await
        .unwrap_err();
    assert!(matches!(error, ConfigError::Io { .. }));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shell_config_receives_env() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "packcli.config.sh",
        "printf '{\"mode\":\"production\",\"env\":%s}' \"$PACKCLI_ENV\"\n",
    );
    let options = LoadOptions {
        env: json!({"flag": true}),
        ..LoadOptions::default()
    };
    let set = loader(&dir).resolve(&options).await.unwrap();
    assert_eq!(set.to_value(), json!({"mode": "production", "env": {"flag": true}}));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shebang_config_retries_async() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "generated.conf",
        "#!/bin/sh\necho '[{\"name\": \"one\"}, {\"name\": \"two\"}]'\n",
    );
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let set = loader(&dir)
        .resolve(&with_config(&["generated.conf"]))
        .await
        .unwrap();
    assert_eq!(set.to_value(), json!([{"name": "one"}, {"name": "two"}]));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_executable_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.sh", "echo boom >&2\nexit 3\n");
    let error = loader(&dir).resolve(&with_config(&["broken.sh"])).await.unwrap_err();
    match error {
        ConfigError::ModuleFailed { message, .. } => assert!(message.contains("boom")),
        other => panic!("unexpected error: {other}"),
    }
}

/// Serves every path from memory, recording which entry point was used.
struct RecordingLoader {
    calls: Mutex<Vec<&'static str>>,
}

impl ModuleLoader for RecordingLoader {
    fn require(&self, path: &Path) -> Result<ConfigExport> {
        self.calls.lock().unwrap().push("require");
        Err(ConfigError::RequiresAsync {
            path: path.to_path_buf(),
        })
    }

    fn import<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, Result<ConfigExport>> {
        self.calls.lock().unwrap().push("import");
        async move {
            let export: Result<ConfigExport> = Ok(ConfigExport::factory(|env: &Value, _argv: &Value| {
                ConfigExport::List(vec![
                    json!({"name": "plain"}).into(),
                    ConfigExport::factory(|env: &Value, _: &Value| {
                        json!({"name": "from-env", "mode": env["mode"]}).into()
                    }),
                    json!({"name": "first-env", "mode": env["mode"]}).into(),
                ])
            }));
            export
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_require_then_import_unwraps_nested_exports() {
    let modules = Arc::new(RecordingLoader {
        calls: Mutex::new(Vec::new()),
    });
    let loader = ConfigLoader::new("/virtual", modules.clone());
    let options = LoadOptions {
        config: vec!["anything.cfg".into()],
        env: json!({"mode": "development"}),
        ..LoadOptions::default()
    };

    let set = loader.resolve(&options).await.unwrap();
    assert_eq!(
        set.to_value(),
        json!([
            {"name": "plain"},
            {"name": "from-env", "mode": "development"},
            {"name": "first-env", "mode": "development"}
        ])
    );
    assert_eq!(*modules.calls.lock().unwrap(), vec!["require", "import"]);
    assert_eq!(set.all_paths(), vec![PathBuf::from("/virtual/anything.cfg")]);
}

/// Serves exports from memory, one queued export per load of a path.
#[derive(Default)]
struct ScriptedLoader {
    exports: Mutex<HashMap<PathBuf, VecDeque<Value>>>,
}

impl ScriptedLoader {
    fn with(self, path: &str, exports: Vec<Value>) -> Self {
        self.exports
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), exports.into());
        self
    }
}

impl ModuleLoader for ScriptedLoader {
    fn require(&self, path: &Path) -> Result<ConfigExport> {
        let next = self
            .exports
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        match next {
            Some(value) => Ok(value.into()),
            None => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    fn import<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ConfigExport>> {
        async move { self.require(path) }.boxed()
    }
}

#[tokio::test]
async fn test_extending_itself_is_recursive_even_when_empty() {
    let modules = ScriptedLoader::default().with(
        "/virtual/main.cfg",
        vec![json!({"name": "main", "extends": "./main.cfg"}), json!([])],
    );
    let loader = ConfigLoader::new("/virtual", Arc::new(modules));
    let error = loader.resolve(&with_config(&["main.cfg"])).await.unwrap_err();
    match error {
        ConfigError::RecursiveConfiguration { path } => {
            assert_eq!(path, PathBuf::from("/virtual/main.cfg"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_extending_an_empty_export_keeps_config() {
    let modules = ScriptedLoader::default()
        .with("/virtual/app.cfg", vec![json!({"name": "app", "extends": "./empty.cfg"})])
        .with("/virtual/empty.cfg", vec![json!([])]);
    let loader = ConfigLoader::new("/virtual", Arc::new(modules));
    let set = loader.resolve(&with_config(&["app.cfg"])).await.unwrap();
    assert_eq!(set.to_value(), json!({"name": "app"}));
    assert_eq!(
        set.all_paths(),
        vec![PathBuf::from("/virtual/app.cfg"), PathBuf::from("/virtual/empty.cfg")]
    );
}
