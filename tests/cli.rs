use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const BCP_STATEMENT: &str = "\
BANCO DE CREDITO DE BOLIVIA,,,,,,,
Cuenta,201-0005751-3-23,,,,,,
Fecha,Hora,Glosa,Suc. Age.,Usuario,Importe,Saldo,Nro. Operación
30/05/2025,09:00:00,ABONO ACH,LPZ,JDOE,210.00,5210.00,1001
30/05/2025,10:00:00,PAGO PROVEEDOR,LPZ,JDOE,-99.90,5110.10,1002
30/05/2025,,SALDO AL CIERRE,,,,5110.10,
";

const PAYMENT_REPORT: &str = "\
CONSULTA DE ABONOS RECIBIDOS,,,,,,,
Nro. Cuenta Destino: 201-0005751-3-23,,,,,,,
CANAL,FECHA,HORA,MONTO ABONADO,MONTO OP.,MONEDA OP.,GLOSA,TITULAR
ACH,30/05/2025,09:00:00,210.00,210.00,BOB,FACTURA 1,ACME SRL
";

fn extracto(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("extracto").unwrap();
    cmd.env("HOME", home)
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(home.join("data"));
    cmd
}

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn process_requires_a_file_argument() {
    let home = tempfile::tempdir().unwrap();
    extracto(home.path()).arg("process").assert().failure();
}

#[test]
fn process_missing_file_fails() {
    let home = tempfile::tempdir().unwrap();
    extracto(home.path())
        .args(["process", "nope.xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn process_unsupported_extension_fails() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "statement.txt", "hello");
    extracto(home.path())
        .arg("process")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format"));
}

#[test]
fn process_unknown_layout_fails() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "foreign.csv", "Date,Description,Amount\n01/15/2025,Coffee,-4.50\n");
    extracto(home.path())
        .arg("process")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported statement layout"));
}

#[test]
fn process_bcp_statement_writes_clean_csv() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "mayo.csv", BCP_STATEMENT);
    extracto(home.path())
        .arg("process")
        .arg(&file)
        .args(["--batch-id", "20250601120000-deadbeef"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BCP statement"))
        .stdout(predicate::str::contains("201-0005751-3-23"))
        .stdout(predicate::str::contains("BCP-20250530-1002"));

    let clean = home.path().join("data").join("processed").join("mayo_bcp_clean.csv");
    let content = std::fs::read_to_string(clean).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.contains("20250601120000-deadbeef"));
    assert!(!content.contains("SALDO AL CIERRE"));
}

#[test]
fn process_report_after_statement_enriches() {
    let home = tempfile::tempdir().unwrap();
    let statement = write(home.path(), "mayo.csv", BCP_STATEMENT);
    let report = write(home.path(), "abonos.csv", PAYMENT_REPORT);
    extracto(home.path()).arg("process").arg(&statement).assert().success();
    extracto(home.path())
        .arg("process")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("BCP payment report"))
        .stdout(predicate::str::contains("ACME SRL - FACTURA 1"));

    let enriched = home.path().join("data").join("processed").join("bcp_final.csv");
    let content = std::fs::read_to_string(enriched).unwrap();
    assert!(content.contains("MATCHED"));
    assert!(content.contains("UNMATCHED"));
}

#[test]
fn enrich_without_cleaned_files_fails() {
    let home = tempfile::tempdir().unwrap();
    extracto(home.path())
        .arg("enrich")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cleaned BCP statement"));
}

#[test]
fn enrich_rejects_report_without_matching_columns() {
    let home = tempfile::tempdir().unwrap();
    let statement = write(home.path(), "mayo.csv", BCP_STATEMENT);
    let bogus = write(home.path(), "otro.csv", "foo,bar\n30/05/2025,210.00\n");
    extracto(home.path()).arg("process").arg(&statement).assert().success();
    extracto(home.path())
        .arg("enrich")
        .arg("--report")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("required for reconciliation"));
    assert!(!home.path().join("data").join("processed").join("bcp_final.csv").exists());
}

#[test]
fn detect_reports_layout_and_account() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "mayo.csv", BCP_STATEMENT);
    extracto(home.path())
        .arg("detect")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("BCP statement"))
        .stdout(predicate::str::contains("201-0005751-3-23"))
        .stdout(predicate::str::contains("row 3"));
}

#[test]
fn store_is_idempotent_per_file() {
    let home = tempfile::tempdir().unwrap();
    let file = write(home.path(), "mayo.csv", BCP_STATEMENT);
    extracto(home.path())
        .arg("process")
        .arg(&file)
        .arg("--store")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 stored, 0 skipped"));
    extracto(home.path())
        .arg("process")
        .arg(&file)
        .arg("--store")
        .assert()
        .success()
        .stdout(predicate::str::contains("already been stored"));
}

#[test]
fn init_creates_data_layout() {
    let home = tempfile::tempdir().unwrap();
    extracto(home.path()).arg("init").assert().success();
    let data = home.path().join("data");
    assert!(data.join("raw").is_dir());
    assert!(data.join("processed").is_dir());
    assert!(data.join("extracto.db").is_file());
    assert!(home.path().join(".config").join("extracto").join("settings.json").is_file());
}
