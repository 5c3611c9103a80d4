#![allow(dead_code)]
use std::fs;
use std::path::Path;

use std::sync::Once;

use indoc::indoc;
use tempfile::TempDir;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

pub const WIDGET_INF: &str = indoc! {r#"
    ; Installation file for the Widget network adapter family.

    [Version]
    Signature   = "$WINDOWS NT$"
    Class       = Net
    ClassGuid   = {4d36e972-e325-11ce-bfc1-08002be10318}
    Provider    = %MfgName%
    CatalogFile = widget.cat
    DriverVer   = 10/01/2023,3.2.1.0

    [Manufacturer]
    %MfgName% = Widget,NTamd64.10.0,NTx86

    [Widget.NTamd64.10.0]
    %WidgetDesc% = Widget_Install,*WDG1234
    %WidgetProDesc% = Widget_Install,*WDG5678

    [Widget.NTx86]
    %WidgetDesc% = Widget_Install,*WDG1234

    [Strings]
    MfgName = "Widget Co"
    WidgetDesc = "Widget Adapter"
    WidgetProDesc = "Widget Adapter Pro"
"#};

pub const NO_MANUFACTURER_INF: &str = indoc! {r#"
    [Version]
    Signature = "$WINDOWS NT$"
    Class     = HDC
    Provider  = Bulk Storage Inc.
    DriverVer = 01/15/2020,1.0.0.0
"#};

/// Builds a two-package driver tree:
/// `net/widget.inf` (+ companion catalog) and `storage/bulk.inf`
/// (no `[Manufacturer]` section).
pub fn driver_tree() -> TempDir {
    let root = tempfile::tempdir().unwrap();

    let net = root.path().join("net");
    fs::create_dir(&net).unwrap();
    fs::write(net.join("widget.inf"), WIDGET_INF).unwrap();
    fs::write(net.join("widget.cat"), b"not a real catalog").unwrap();

    let storage = root.path().join("storage");
    fs::create_dir(&storage).unwrap();
    fs::write(storage.join("bulk.inf"), NO_MANUFACTURER_INF).unwrap();

    root
}

/// Writes `text` as UTF-16LE with a byte order mark, the way vendor INF
/// files commonly ship.
pub fn write_utf16le(path: &Path, text: &str) {
    let mut bytes = vec![0xff, 0xfe];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    fs::write(path, bytes).unwrap();
}
