//! Resolution of file-backed documents through the public API.

use refconf::parsers::ParserRegistry;
use refconf::readers::file::path_to_uri;
use refconf::readers::{EnvReader, FileReader, ReaderRegistry};
use refconf::{ErrorCode, ResolveOpts, Resolver};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn resolver() -> Resolver {
    let mut readers = ReaderRegistry::new();
    readers.push(EnvReader::from_vars([("DB_PASSWORD", "hunter2")]));
    readers.push(FileReader::default());
    Resolver::new(readers, ParserRegistry::with_defaults(), false)
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path_to_uri(&path).expect("Failed to build uri")
}

async fn resolve(resolver: &Resolver, uri: &str) -> refconf::Result<Value> {
    resolver.resolve(uri, ResolveOpts::new(), None).await
}

#[tokio::test]
async fn yaml_references_json_toml_and_env() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "db.json",
        r#"{"primary": {"host": "db1", "port": 5432}, "replica": {"host": "db2"}}"#,
    );
    write(temp.path(), "limits.toml", "[http]\ntimeout = 30\nretries = 3\n");
    write(
        temp.path(),
        "secrets.env",
        "# secrets\nexport DB_USER=admin\nDB_PASSWORD=\"@ref env:DB_PASSWORD\"\n",
    );
    let root = write(
        temp.path(),
        "app.yaml",
        "name: app\n\
         db: !ref db.json#primary\n\
         replicaHost: !ref db.json#/replica/host\n\
         timeout: !ref limits.toml#/http/timeout\n\
         credentials: !ref secrets.env\n",
    );

    let config = resolve(&resolver(), &root).await.unwrap();
    assert_eq!(
        config,
        json!({
            "name": "app",
            "db": {"host": "db1", "port": 5432},
            "replicaHost": "db2",
            "timeout": 30,
            "credentials": {"DB_USER": "admin", "DB_PASSWORD": "hunter2"}
        })
    );
}

#[tokio::test]
async fn ini_file_with_sections_and_refs() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "legacy.ini",
        "[db]\nhost = db1\npassword = @ref env:DB_PASSWORD\n\n[db.pool]\nshared = true\n",
    );
    let root = write(temp.path(), "app.yaml", "legacy: !ref legacy.ini#db\n");

    let config = resolve(&resolver(), &root).await.unwrap();
    assert_eq!(
        config,
        json!({"legacy": {"host": "db1", "password": "hunter2", "pool": {"shared": true}}})
    );
}

#[tokio::test]
async fn query_reads_own_document_through_ref() {
    let temp = TempDir::new().unwrap();
    let root = write(
        temp.path(),
        "app.json",
        r#"{
            "db": {"host": "db1", "port": 5432},
            "url": {"$query": "'postgres://' & $ref('#/db/host') & ':' & $string($ref('#db').port)"}
        }"#,
    );

    let config = resolve(&resolver(), &root).await.unwrap();
    assert_eq!(config["url"], json!("postgres://db1:5432"));
}

#[tokio::test]
async fn fragment_of_root_document() {
    let temp = TempDir::new().unwrap();
    let root = write(temp.path(), "app.yaml", "a:\n  b: [1, 2, 3]\n");

    let resolver = resolver();
    assert_eq!(
        resolve(&resolver, &format!("{}#/a/b/1", root)).await.unwrap(),
        json!(2)
    );
    assert_eq!(
        resolve(&resolver, &format!("{}#a", root)).await.unwrap(),
        json!({"b": [1, 2, 3]})
    );
    let err = resolve(&resolver, &format!("{}#/a/c", root))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::FragmentNotFound);
}

#[tokio::test]
async fn binary_file_becomes_data_uri() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    let root = write(temp.path(), "app.yaml", "logo: !ref logo.png\n");

    let config = resolve(&resolver(), &root).await.unwrap();
    assert_eq!(config["logo"], json!("data:image/png;base64,iVBORw=="));
}

#[tokio::test]
async fn file_cycle_is_reported() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "b.yaml", "back: !ref a.yaml\n");
    let root = write(temp.path(), "a.yaml", "next: !ref b.yaml\n");

    let err = resolve(&resolver(), &root).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::CircularReference);
}

#[tokio::test]
async fn missing_file_is_a_read_error() {
    let temp = TempDir::new().unwrap();
    let root = write(temp.path(), "a.yaml", "x: !ref missing.yaml\n");

    let err = resolve(&resolver(), &root).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReadFailed);
    assert!(err.to_string().contains("missing.yaml"));
}

#[tokio::test]
async fn unknown_extension_is_returned_as_text() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "motd.txt", "hello\n");
    let root = write(temp.path(), "a.yaml", "motd: !ref motd.txt\n");

    let config = resolve(&resolver(), &root).await.unwrap();
    assert_eq!(config["motd"], json!("hello\n"));
}

#[tokio::test]
async fn content_type_option_overrides_extension() {
    let temp = TempDir::new().unwrap();
    let uri = write(temp.path(), "settings.conf", "port: 8080\n");

    let value = resolver()
        .resolve(&uri, ResolveOpts::new().with_content_type("application/yaml"), None)
        .await
        .unwrap();
    assert_eq!(value, json!({"port": 8080}));
}
