//! File-backed workspace analysis: load, match, evaluate, export.

use std::fs;
use std::path::Path;

use flowgate_workspace::{
    AnalysisConfig, HierarchyKind, ReportFormat, Workspace, WorkspaceError, analyze_file, reports,
    write_report_file,
};
use tempfile::tempdir;

const WORKSPACE: &str = r#"{
  "schema_version": 1,
  "samples": {
    "1": {
      "filename": "tube_01.tsv",
      "event_count": 100,
      "populations": [
        {
          "label": "Lymphocytes",
          "gates": [{ "type": "Polygon", "x_axis": "FSC-A", "y_axis": "SSC-A",
            "vertices": [{"x": 20, "y": 0}, {"x": 20, "y": 100}, {"x": 80, "y": 100}, {"x": 80, "y": 0}] }],
          "children": [
            { "label": "CD3+",
              "gates": [{ "type": "Polygon", "x_axis": "CD3", "y_axis": "SSC-A",
                "vertices": [{"x": 100, "y": 0}, {"x": 100, "y": 100}, {"x": 200, "y": 100}, {"x": 200, "y": 0}] }] },
            { "label": "NOT-CD3",
              "gates": [{ "type": "Boolean", "specification": "!Lymphocytes/CD3+" }] }
          ]
        }
      ]
    },
    "2": { "filename": "tube_02.tsv", "populations": [] }
  },
  "groups": {
    "10": {
      "name": "All events",
      "samples": ["1", "2"],
      "populations": [
        { "label": "Everything" },
        { "label": "CD19+",
          "gates": [{ "type": "Polygon", "x_axis": "CD19", "y_axis": "SSC-A",
            "vertices": [{"x": 0, "y": 0}, {"x": 0, "y": 1}, {"x": 1, "y": 1}] }],
          "children": [{ "label": "Memory" }] }
      ]
    },
    "11": { "name": "Other panel", "samples": ["2"], "populations": [{ "label": "X" }] }
  }
}"#;

/// 100 events: 40 lymphocytes, 15 of them CD3 high.
fn write_events(path: &Path) {
    let mut text = String::from("FSC-A\tSSC-A\tFITC-A:CD3\n");
    for i in 0..100 {
        let fsc = if i < 40 { 30.0 + i as f64 } else { 5.0 };
        let cd3 = if i < 15 { 150.0 } else { 20.0 };
        text.push_str(&format!("{fsc}\t50\t{cd3}\n"));
    }
    fs::write(path, text).unwrap();
}

fn tab_config() -> AnalysisConfig {
    AnalysisConfig::from_toml_str("[events]\ndelimiter = \"\\t\"\n").unwrap()
}

#[test]
fn file_analysis_covers_sample_and_groups() {
    let dir = tempdir().unwrap();
    let ws_path = dir.path().join("workspace.json");
    fs::write(&ws_path, WORKSPACE).unwrap();
    let events = dir.path().join("tube_01.tsv");
    write_events(&events);

    let workspace = Workspace::load(&ws_path).unwrap();
    let analysis = analyze_file(&workspace, &events, &tab_config()).unwrap();

    assert_eq!(analysis.file, "tube_01.tsv");
    let targets: Vec<(HierarchyKind, &str)> = analysis
        .analyses
        .iter()
        .map(|a| (a.kind, a.id.as_str()))
        .collect();
    assert_eq!(
        targets,
        vec![(HierarchyKind::Sample, "1"), (HierarchyKind::Group, "10")]
    );

    let reports = reports(&workspace, &analysis.analyses, &tab_config()).unwrap();
    let counts: Vec<(&str, Option<usize>, Option<usize>)> = reports[0]
        .rows
        .iter()
        .map(|r| (r.label.as_str(), r.parent_count, r.filtered_count))
        .collect();
    assert_eq!(
        counts,
        vec![
            ("Lymphocytes", Some(100), Some(40)),
            ("CD3+", Some(40), Some(15)),
            ("NOT-CD3", Some(40), Some(25)),
        ]
    );

    let group = &reports[1];
    assert_eq!(group.key(), "group-10");
    assert_eq!(group.rows[0].gate_type, "None");
    assert_eq!(group.rows[0].filtered_count, Some(100));
    assert_eq!(group.rows[1].status, "failed");
    assert_eq!(group.rows[2].status, "skipped");
}

#[test]
fn csv_reports_land_in_output_directory() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("tube_01.tsv");
    write_events(&events);
    let workspace = Workspace::from_json_str(WORKSPACE).unwrap();
    let analysis = analyze_file(&workspace, &events, &tab_config()).unwrap();
    let reports = reports(&workspace, &analysis.analyses, &tab_config()).unwrap();

    let out = dir.path().join("reports");
    fs::create_dir(&out).unwrap();
    let written = write_report_file(&out, &events, &reports[1], ReportFormat::Csv).unwrap();

    assert_eq!(written, out.join("tube_01__group-10__All events.csv"));
    let text = fs::read_to_string(&written).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("ancestor_path,label,gate_type,parent_count,filtered_count,status,regions")
    );
    assert_eq!(lines.next(), Some("root,Everything,None,100,100,ungated,0"));
    assert_eq!(lines.next(), Some("root,CD19+,Polygon,100,,failed,1"));
    assert_eq!(lines.next(), Some("root/CD19+,Memory,None,,,skipped,0"));
}

#[test]
fn groups_with_the_same_name_get_their_own_reports() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("tube.csv");
    fs::write(&events, "A,B\n1,1\n2,1\n").unwrap();
    let workspace = Workspace::from_json_str(
        r#"{
          "samples": { "s": { "filename": "tube.csv", "populations": [{ "label": "S" }] } },
          "groups": {
            "10": { "name": "T cells", "samples": ["s"], "populations": [{ "label": "A" }] },
            "11": { "name": "T cells", "samples": ["s"], "populations": [{ "label": "B" }] }
          }
        }"#,
    )
    .unwrap();
    let config = AnalysisConfig::default();
    let analysis = analyze_file(&workspace, &events, &config).unwrap();
    let reports = reports(&workspace, &analysis.analyses, &config).unwrap();
    assert_eq!(reports.len(), 3);

    let out = dir.path().join("reports");
    fs::create_dir(&out).unwrap();
    let paths: Vec<_> = reports
        .iter()
        .map(|report| write_report_file(&out, &events, report, ReportFormat::Csv).unwrap())
        .collect();

    assert_eq!(fs::read_dir(&out).unwrap().count(), 3);
    let group_10 = fs::read_to_string(&paths[1]).unwrap();
    let group_11 = fs::read_to_string(&paths[2]).unwrap();
    assert!(paths[1].ends_with("tube__group-10__T cells.csv"));
    assert!(group_10.contains("root,A,None,2,2,ungated,0"));
    assert!(group_11.contains("root,B,None,2,2,ungated,0"));
}

#[test]
fn unmatched_file_is_reported() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("tube_99.tsv");
    write_events(&events);
    let workspace = Workspace::from_json_str(WORKSPACE).unwrap();
    assert!(matches!(
        analyze_file(&workspace, &events, &tab_config()),
        Err(WorkspaceError::NoMatch { file }) if file == "tube_99.tsv"
    ));
}

#[test]
fn abort_policy_fails_the_group() {
    let dir = tempdir().unwrap();
    let events = dir.path().join("tube_01.tsv");
    write_events(&events);
    let workspace = Workspace::from_json_str(WORKSPACE).unwrap();
    let config = AnalysisConfig::from_toml_str(
        "[walker]\nchannel_errors = \"abort\"\n[events]\ndelimiter = \"\\t\"\n",
    )
    .unwrap();
    assert!(matches!(
        analyze_file(&workspace, &events, &config),
        Err(WorkspaceError::Gate(_))
    ));
}

#[test]
fn config_file_format_follows_extension() {
    let dir = tempdir().unwrap();
    let toml_path = dir.path().join("flowgate.toml");
    fs::write(&toml_path, "[report]\nsort = true\n").unwrap();
    let json_path = dir.path().join("flowgate.json");
    fs::write(&json_path, r#"{"execution": {"parallel": false}}"#).unwrap();

    assert!(AnalysisConfig::from_file(&toml_path).unwrap().report.sort);
    assert!(!AnalysisConfig::from_file(&json_path).unwrap().execution.parallel);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[log]\nlevel = \"chatty\"\n").unwrap();
    assert!(matches!(
        AnalysisConfig::from_file(&bad),
        Err(WorkspaceError::InvalidConfig(_))
    ));
}
