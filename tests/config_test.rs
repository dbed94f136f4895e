//! 三层配置合并测试
//!
//! 进程默认值只能安装一次，所以全部断言放在同一个测试里

use rat_docbridge::config::{keys, process_defaults};
use rat_docbridge::{init_process_defaults, ConnectorOptions, PartitionerKind, ReadConfig, SaveMode, WriteConfig};
use std::io::Write;

#[test]
fn test_process_connection_call_precedence() {
    rat_docbridge::init();

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
database = "middle_earth"
collection = "people"
"read.partitioner" = "single"

[read]
sampleSize = 200

[write]
saveMode = "ignore"
maxBatchSize = 64
"#
    )
    .unwrap();

    let defaults = ConnectorOptions::from_file(file.path()).unwrap();
    init_process_defaults(defaults).unwrap();
    assert!(init_process_defaults(ConnectorOptions::new()).is_err(), "进程默认值只能安装一次");
    assert_eq!(process_defaults().get(keys::DATABASE), Some("middle_earth"));

    let connection = ConnectorOptions::new()
        .with(keys::READ_SAMPLE_SIZE, 50)
        .with(keys::WRITE_SAVE_MODE, "append");
    let call = ConnectorOptions::new().with(keys::COLLECTION, "hobbits");

    let read = ReadConfig::resolve(&call, &connection).unwrap();
    println!("🔍 解析后的读取配置: {:?}", read);
    assert_eq!(read.namespace.to_string(), "middle_earth.hobbits");
    assert_eq!(read.sample_size, 50);
    assert_eq!(read.partitioner.kind, PartitionerKind::Single);

    let write = WriteConfig::resolve(&ConnectorOptions::new(), &connection).unwrap();
    assert_eq!(write.namespace.to_string(), "middle_earth.people");
    assert_eq!(write.save_mode, SaveMode::Append);
    assert_eq!(write.max_batch_size, 64);

    let overwrite = WriteConfig::resolve(
        &ConnectorOptions::new().with(keys::WRITE_SAVE_MODE, "overwrite"),
        &connection,
    )
    .unwrap();
    assert_eq!(overwrite.save_mode, SaveMode::Overwrite);
}
