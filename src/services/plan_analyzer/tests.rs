//! End-to-end tests for the plan analyzer
//!
//! Fixtures under tests/fixtures/plans are JSON renderings of decoded TiDB
//! binary plans. Blob inputs are protobuf messages wrapped with snappy and
//! base64 the way TiDB does.

#[cfg(test)]
mod plan_tests {
    use crate::services::plan_analyzer::models::*;
    use crate::services::plan_analyzer::parser::decoder::{SHOW_PLAN_BLOB, encode_blob};
    use crate::services::plan_analyzer::parser::explain_data::{
        ExplainAccessObject, ExplainData, ExplainOperator, ExplainScanObject,
    };
    use crate::services::plan_analyzer::{
        AnalysisContext, DiagnosticThresholds, analyze_binary_plan, analyze_binary_plan_json,
        analyze_plan_forest, analyze_plan_json,
    };
    use crate::utils::AppError;
    use prost::Message;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Get the path to test fixtures
    fn get_fixture_path(filename: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("tests/fixtures/plans");
        path.push(filename);
        path
    }

    /// Load a plan fixture file
    fn load_plan(filename: &str) -> String {
        let path = get_fixture_path(filename);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", path.display(), e))
    }

    fn analyze_fixture(filename: &str) -> PlanForest {
        analyze_plan_json(&load_plan(filename), &AnalysisContext::default())
            .unwrap()
            .unwrap()
    }

    /// Depth-first lookup by operator name
    fn find<'a>(node: &'a PlanNode, name: &str) -> Option<&'a PlanNode> {
        if node.name == name {
            return Some(node);
        }
        node.children.iter().find_map(|child| find(child, name))
    }

    fn node<'a>(forest: &'a PlanForest, name: &str) -> &'a PlanNode {
        forest
            .trees()
            .find_map(|tree| find(tree, name))
            .unwrap_or_else(|| panic!("operator {} not found", name))
    }

    fn assert_durations_cover_children(node: &PlanNode) {
        let duration = node.duration.expect("every node gets a duration");
        for child in &node.children {
            assert!(
                duration >= child.duration.unwrap_or_default(),
                "{} ({:?}) is shorter than child {} ({:?})",
                node.name,
                duration,
                child.name,
                child.duration
            );
            assert_durations_cover_children(child);
        }
    }

    mod blob_tests {
        use super::*;

        #[test]
        fn test_empty_input_yields_empty_output() {
            assert_eq!(analyze_binary_plan_json("").unwrap(), "");
            assert!(
                analyze_binary_plan(" \n", &AnalysisContext::default())
                    .unwrap()
                    .is_none()
            );
        }

        /// Protobuf message of the missing_index.json fixture
        fn missing_index_message() -> ExplainData {
            let scan = ExplainOperator {
                name: "TableFullScan_5".to_string(),
                task_type: Some(2),
                store_type: Some(2),
                est_rows: Some(6_000_000.0),
                act_rows: Some(6_000_000),
                operator_info: Some("keep order:false".to_string()),
                access_objects: vec![ExplainAccessObject {
                    scan_object: Some(ExplainScanObject {
                        database: Some("test".to_string()),
                        table: Some("t".to_string()),
                        ..Default::default()
                    }),
                    other_object: None,
                }],
                cop_exec_info: Some(
                    "tikv_task:{proc max:500ms, min:70ms, avg: 230ms, p80:380ms, p95:500ms, iters:5870, tasks:8}"
                        .to_string(),
                ),
                memory_bytes: Some(-1),
                disk_bytes: Some(-1),
                ..Default::default()
            };
            let selection = ExplainOperator {
                name: "Selection_6".to_string(),
                task_type: Some(2),
                store_type: Some(2),
                est_rows: Some(10.0),
                act_rows: Some(500),
                operator_info: Some("eq(t.a,1)".to_string()),
                cop_exec_info: Some(
                    "tikv_task:{proc max:550ms, min:80ms, avg: 250ms, p80:400ms, p95:550ms, iters:5870, tasks:8}"
                        .to_string(),
                ),
                memory_bytes: Some(-1),
                disk_bytes: Some(-1),
                children: vec![scan],
                ..Default::default()
            };
            let reader = ExplainOperator {
                name: "TableReader_7".to_string(),
                task_type: Some(1),
                store_type: Some(1),
                est_rows: Some(10.0),
                act_rows: Some(500),
                operator_info: Some("data:Selection_6".to_string()),
                root_basic_exec_info: Some("time:1.2s, loops:2".to_string()),
                root_group_exec_info: vec![
                    "cop_task: {num: 8, max: 600ms, min: 100ms, avg: 300ms, p95: 600ms, rpc_num: 8, rpc_time: 2.4s, distsql_concurrency: 4}"
                        .to_string(),
                ],
                memory_bytes: Some(2048),
                disk_bytes: Some(-1),
                children: vec![selection],
                ..Default::default()
            };

            ExplainData { main: Some(reader), with_runtime_stats: Some(true), ..Default::default() }
        }

        #[test]
        fn test_blob_to_annotated_json() {
            let blob = encode_blob(&missing_index_message().encode_to_vec());
            let output = analyze_binary_plan_json(&blob).unwrap();

            let value: serde_json::Value = serde_json::from_str(&output).unwrap();
            assert_eq!(value["main"]["name"], "TableReader_7");
            assert_eq!(value["main"]["duration"], "1.2s");
            assert_eq!(value["main"]["diskBytes"], "N/A");
            assert_eq!(value["main"]["taskType"], "root");
            assert_eq!(value["withRuntimeStats"], true);

            let selection = &value["main"]["children"][0];
            assert!(
                selection["diagnosis"][0]
                    .as_str()
                    .unwrap()
                    .contains("Consider adding an index on t.a")
            );
            assert_eq!(selection["copExecInfo"]["tikv_task"]["tasks"], "8");
        }

        #[test]
        fn test_blob_matches_json_rendering() {
            let blob = encode_blob(&missing_index_message().encode_to_vec());
            let from_blob = analyze_binary_plan(&blob, &AnalysisContext::default())
                .unwrap()
                .unwrap();
            assert_eq!(from_blob, analyze_fixture("missing_index.json"));
        }

        #[test]
        fn test_tidb_show_plan() {
            let output = analyze_binary_plan_json(SHOW_PLAN_BLOB).unwrap();

            let value: serde_json::Value = serde_json::from_str(&output).unwrap();
            assert_eq!(value["main"]["name"], "Show_2");
            assert_eq!(value["main"]["duration"], "34.8µs");
            assert_eq!(value["main"]["actRows"], 5);
            assert_eq!(value["main"]["memoryBytes"], "N/A");
            assert_eq!(value["main"]["diskBytes"], "N/A");
            assert_eq!(value["main"]["taskType"], "root");
            assert_eq!(value["main"]["storeType"], "tidb");
            assert_eq!(value["main"]["rootBasicExecInfo"]["loops"], "2");
            assert_eq!(value["withRuntimeStats"], true);
        }

        #[test]
        fn test_corrupt_blob_is_an_error() {
            assert!(matches!(analyze_binary_plan_json("not a plan"), Err(AppError::Parse(_))));

            let truncated = encode_blob(&missing_index_message().encode_to_vec()[..20]);
            let err = analyze_binary_plan_json(&truncated).unwrap_err();
            assert!(matches!(err, AppError::Parse(_)));
        }
    }

    mod duration_tests {
        use super::*;

        #[test]
        fn test_cop_tasks_scaled_by_distsql_concurrency() {
            let forest = analyze_fixture("missing_index.json");

            assert_eq!(forest.main.duration, Some(Duration::from_millis(1200)));
            // 8 tasks over 4 workers: twice the average
            assert_eq!(node(&forest, "Selection_6").duration, Some(Duration::from_millis(500)));
            assert_eq!(node(&forest, "TableFullScan_5").duration, Some(Duration::from_millis(460)));
        }

        #[test]
        fn test_cop_estimate_capped_by_proc_max() {
            let forest = analyze_fixture("huge_tikv_scan.json");

            assert_eq!(node(&forest, "HashAgg_6").duration, Some(Duration::from_secs(2)));
            assert_eq!(node(&forest, "TableFullScan_11").duration, Some(Duration::from_millis(1900)));
            assert_eq!(forest.main.duration, Some(Duration::from_secs(42)));
        }

        #[test]
        fn test_index_join_probe_side_divided_by_inner_concurrency() {
            let forest = analyze_fixture("index_hash_join.json");

            let build = node(&forest, "IndexReader_20");
            assert_eq!(build.driver_side, Some(DriverSide::Build));
            assert_eq!(build.duration, Some(Duration::from_millis(200)));

            let probe = node(&forest, "IndexReader_25");
            assert_eq!(probe.driver_side, Some(DriverSide::Probe));
            assert_eq!(probe.duration, Some(Duration::from_millis(1600)));

            assert_eq!(forest.main.duration, Some(Duration::from_secs(3)));
        }

        #[test]
        fn test_duration_never_below_child() {
            for fixture in [
                "missing_index.json",
                "huge_tikv_scan.json",
                "index_hash_join.json",
                "cte_plan.json",
            ] {
                let forest = analyze_fixture(fixture);
                for tree in forest.trees() {
                    assert_durations_cover_children(tree);
                }
            }
        }
    }

    mod diagnosis_tests {
        use super::*;

        #[test]
        fn test_missing_index_on_selection() {
            let forest = analyze_fixture("missing_index.json");

            let selection = node(&forest, "Selection_6");
            assert_eq!(selection.diagnosis.len(), 1);
            assert!(selection.diagnosis[0].contains("Consider adding an index"));
            assert!(node(&forest, "TableFullScan_5").diagnosis.is_empty());
            assert!(forest.main.diagnosis.is_empty());
        }

        #[test]
        fn test_huge_tikv_scan_suggests_tiflash() {
            let forest = analyze_fixture("huge_tikv_scan.json");

            let scan = node(&forest, "TableFullScan_11");
            assert_eq!(scan.diagnosis.len(), 1);
            assert!(scan.diagnosis[0].contains("Consider using TiFlash"));
            assert!(scan.diagnosis[0].contains("2,000,000,000"));
        }

        #[test]
        fn test_large_index_join_build() {
            let forest = analyze_fixture("index_hash_join.json");
            assert_eq!(forest.main.diagnosis.len(), 1);
            assert!(forest.main.diagnosis[0].contains("12,000"));
        }

        #[test]
        fn test_thresholds_from_context() {
            let context = AnalysisContext::with_thresholds(DiagnosticThresholds {
                index_join_max_build_tasks: 20_000,
                ..Default::default()
            });
            let forest = analyze_plan_json(&load_plan("index_hash_join.json"), &context)
                .unwrap()
                .unwrap();
            assert!(forest.main.diagnosis.is_empty());
        }
    }

    mod cte_tests {
        use super::*;

        #[test]
        fn test_cte_trees_analyzed_independently() {
            let forest = analyze_fixture("cte_plan.json");
            assert_eq!(forest.ctes.len(), 1);

            let cte = &forest.ctes[0];
            assert_eq!(cte.duration, Some(Duration::from_millis(3)));
            assert_eq!(forest.main.duration, Some(Duration::from_millis(5)));

            let scan = node(&forest, "TableFullScan_13");
            assert_eq!(scan.diagnosis.len(), 2);
            assert!(scan.diagnosis[0].contains("stats:pseudo"));
            assert!(scan.diagnosis[1].contains("differ by"));
            // the scan already owns the estimation error
            assert!(node(&forest, "Selection_14").diagnosis.is_empty());
        }

        #[test]
        fn test_system_schema_pseudo_stats_ignored() {
            let plan = load_plan("cte_plan.json").replace("\"database\": \"test\"", "\"database\": \"mysql\"");
            let forest = analyze_plan_json(&plan, &AnalysisContext::default()).unwrap().unwrap();

            let scan = node(&forest, "TableFullScan_13");
            assert_eq!(scan.diagnosis.len(), 1);
            assert!(!scan.diagnosis[0].contains("stats:pseudo"));
        }
    }

    mod idempotency_tests {
        use super::*;

        #[test]
        fn test_reanalysis_reproduces_output() {
            for fixture in ["missing_index.json", "index_hash_join.json", "cte_plan.json"] {
                let first = analyze_fixture(fixture);
                let json = serde_json::to_string(&first).unwrap();

                let second = analyze_plan_json(&json, &AnalysisContext::default())
                    .unwrap()
                    .unwrap();
                assert_eq!(first, second, "{} changed on re-analysis", fixture);
                assert_eq!(json, serde_json::to_string(&second).unwrap());
            }
        }

        #[test]
        fn test_reanalysis_in_memory() {
            let first = analyze_fixture("huge_tikv_scan.json");
            let second = analyze_plan_forest(first.clone(), &AnalysisContext::default()).unwrap();
            assert_eq!(first, second);
        }
    }
}
