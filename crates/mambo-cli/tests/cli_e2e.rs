use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn mambo_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mambo"))
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(mambo_bin())
        .args(args)
        .current_dir(cwd)
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn mambo")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "mambo failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[test]
fn mode_then_crossnet_with_default_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    fs::write(d.join("genes.tsv"), "# go genes\nTP53\tp\nBRCA1\tb\nTP53\tp\n").unwrap();
    fs::write(d.join("terms.tsv"), "GO:0006915\nGO:0006281\n").unwrap();
    fs::write(
        d.join("edges.tsv"),
        "TP53\tGO:0006915\tIDA\nBRCA1\tGO:0006281\tIMP\n",
    )
    .unwrap();
    fs::create_dir(d.join("out")).unwrap();

    assert_success(&run(
        &["mode", "genes.tsv", "gene", "GO", "0", "--output-dir", "out"],
        d,
    ));
    assert_success(&run(
        &["mode", "terms.tsv", "function", "GO", "0", "--output-dir", "out"],
        d,
    ));

    let date = date_stamp(&d.join("out"), "miner-gene-0-GO-");
    let gene_file = format!("out/miner-gene-0-GO-{date}.tsv");
    let function_file = format!("out/miner-function-0-GO-{date}.tsv");
    assert_eq!(
        data_lines(&d.join(&gene_file)),
        vec!["0\tTP53\tp", "1\tBRCA1\tb"]
    );
    assert_eq!(
        data_lines(&d.join(format!("out/miner-gene-{date}.tsv"))),
        vec!["0\t0", "1\t0"]
    );

    let output = run(
        &[
            "crossnet",
            "edges.tsv",
            &gene_file,
            &function_file,
            "GO",
            "0",
            "--output-dir",
            "out",
        ],
        d,
    );
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("2 edges"));
    assert_eq!(
        data_lines(&d.join(format!("out/miner-gene-function-{date}.tsv"))),
        vec!["0\t0\t0\t0", "1\t0\t1\t1"]
    );
    assert_eq!(
        data_lines(&d.join(format!("out/miner-gene-function-0-GO-{date}.tsv"))),
        vec!["0\t0\t0\tIDA", "1\t0\t0\tIMP"]
    );
}

/// Date stamp of the first file in `dir` starting with `prefix`.
fn date_stamp(dir: &Path, prefix: &str) -> String {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .find_map(|name| {
            name.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".tsv"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| panic!("no {prefix}* file in {}", dir.display()))
}

#[test]
fn counter_conflict_exits_nonzero_and_leaves_files() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    fs::write(d.join("genes.tsv"), "TP53\n").unwrap();
    fs::write(d.join("full.tsv"), "# Full mode table for gene\n4\t0\n").unwrap();

    let output = run(
        &[
            "mode",
            "genes.tsv",
            "gene",
            "HUGO",
            "1",
            "--full-mode-file",
            "full.tsv",
            "--db-node-file",
            "db.tsv",
            "--mambo-id-counter-start",
            "4",
        ],
        d,
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("counter start 4"));
    assert_eq!(data_lines(&d.join("full.tsv")), vec!["4\t0"]);
    assert!(!d.join("db.tsv").exists());
}

#[test]
fn crossnet_rejects_unparseable_mode_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    fs::write(d.join("edges.tsv"), "A\tB\n").unwrap();
    fs::write(d.join("genes.tsv"), "0\tA\n").unwrap();

    let output = run(
        &["crossnet", "edges.tsv", "genes.tsv", "genes.tsv", "X", "2"],
        d,
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("source mode table"));
}

#[test]
fn mapping_then_mapped_mode() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    fs::write(
        d.join("pairs.tsv"),
        "P04637\tENSP00000269305\nP38398\tENSP00000418960\n",
    )
    .unwrap();
    fs::write(d.join("string.tsv"), "9606.ENSP00000269305\t0.9\n9606.ENSP00000999999\t0.4\n")
        .unwrap();

    assert_success(&run(
        &[
            "mapping",
            "pairs.tsv",
            "map.tsv",
            "--output-title1",
            "UniProt",
            "--output-title2",
            "Ensembl",
        ],
        d,
    ));
    assert_eq!(
        fs::read_to_string(d.join("map.tsv")).unwrap(),
        "#Mambo_id\tUniProt\tEnsembl\n0\tP04637\tENSP00000269305\n1\tP38398\tENSP00000418960\n"
    );

    assert_success(&run(
        &[
            "mapped-mode",
            "protein",
            "string.tsv",
            "STRING",
            "5",
            "map.tsv",
            "2",
            "--qualified-keys",
            "--full-mode-file",
            "full.tsv",
            "--db-node-file",
            "db.tsv",
        ],
        d,
    ));
    assert_eq!(
        data_lines(&d.join("db.tsv")),
        vec!["0\t9606.ENSP00000269305\t0.9", "2\t9606.ENSP00000999999\t0.4"]
    );
    assert_eq!(data_lines(&d.join("full.tsv")), vec!["0\t5", "2\t5"]);
    assert!(fs::read_to_string(d.join("map.tsv"))
        .unwrap()
        .ends_with("2\tNone\tENSP00000999999\n"));
}

#[test]
fn run_plan_executes_steps_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let d = dir.path();
    fs::write(d.join("go.tsv"), "TP53\nBRCA1\n").unwrap();
    fs::write(d.join("hugo.tsv"), "EGFR\nTP53\n").unwrap();
    fs::write(d.join("edges.tsv"), "TP53\tBRCA1\n").unwrap();
    fs::write(
        d.join("plan.json"),
        r#"{
          "steps": [
            { "step": "mode", "input": "go.tsv", "mode": "gene", "dataset": "GO", "dataset_id": 0,
              "full_mode_file": "gene_full.tsv", "db_node_file": "gene_go.tsv" },
            { "step": "mode", "input": "hugo.tsv", "mode": "gene", "dataset": "HUGO", "dataset_id": 1,
              "full_mode_file": "gene_full.tsv", "db_node_file": "gene_hugo.tsv" },
            { "step": "crossnet", "input": "edges.tsv", "src_file": "gene_go.tsv", "dst_file": "gene_go.tsv",
              "dataset": "GO", "dataset_id": 0, "mode_name1": "gene", "mode_name2": "gene",
              "src_dataset_id": 0, "dst_dataset_id": 0,
              "full_crossnet_file": "gg_full.tsv", "db_edge_file": "gg_go.tsv" }
          ]
        }"#,
    )
    .unwrap();

    // Run from elsewhere: plan paths are relative to the plan file.
    let elsewhere = tempfile::tempdir().unwrap();
    let plan = d.join("plan.json");
    let output = run(&["run", plan.to_str().unwrap()], elsewhere.path());
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("step 3/3"));

    assert_eq!(
        data_lines(&d.join("gene_full.tsv")),
        vec!["0\t0", "1\t0", "2\t1", "3\t1"]
    );
    assert_eq!(data_lines(&d.join("gene_hugo.tsv")), vec!["2\tEGFR", "3\tTP53"]);
    assert_eq!(data_lines(&d.join("gg_full.tsv")), vec!["0\t0\t0\t1"]);
    let full = fs::read_to_string(d.join("gene_full.tsv")).unwrap();
    assert_eq!(full.matches("# Full mode table for gene").count(), 1);
}
