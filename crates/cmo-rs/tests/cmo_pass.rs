use cmo_rs::cmo::{render_labels, CmoLabelTable, CmoType};
use cmo_rs::graph::topology::{validate_graph_topology, TopologyError};
use cmo_rs::graph::{Graph, OutAnchor};
use cmo_rs::{cmo_graph, schedule_cmo, CmoConfig, CmoError, CmoSchedulePass, NodeId};

const MIXED: &str = r#"
graph @mixed {
  %w  = const out[128] weights[128]
  %n1 = conv(%w.0 size=128) engine=aicore stream=0 rw=0 out[1024] ws[512]
  %n2 = relu(%n1.0 eol visit=[2]) stream=0 rw=1 out[1024]
  %n3 = add(%n2.0 eol visit=[1]) stream=0 rw=2 out[1024]
  %n4 = mul(%n3.0 eol visit=[1]) engine=aicore stream=0 rw=3 out[1024]
  %n5 = mul(%n4.0 eol visit=[7]) engine=aicore stream=0 rw=10 out[16]
  reuse %n1.ws0 -> %n4.out0
}
"#;

#[test]
fn pass_reports_label_statistics() {
    let mut graph = cmo_graph!(MIXED);
    let result = CmoSchedulePass::new(CmoConfig::default())
        .run(&mut graph)
        .unwrap();

    assert!(result.changed);
    assert_eq!(result.visited_nodes, 6);
    assert_eq!(result.labels_added, 4);
    assert_eq!(result.count(CmoType::Prefetch), 1);
    assert_eq!(result.count(CmoType::Invalid), 1);
    assert_eq!(result.count(CmoType::Barrier), 1);
    assert_eq!(result.count(CmoType::Writeback), 1);

    assert_eq!(
        render_labels(&graph).trim(),
        "%w: Prefetch[%n1.out0]\n%n1: Invalid[%n4.out0]\n%n4: Barrier[%n4.out0] Writeback[%n5.out0]"
    );
}

#[test]
fn pass_refuses_to_run_twice() {
    let mut graph = cmo_graph!(MIXED);
    let pass = CmoSchedulePass::new(CmoConfig::default());
    pass.run(&mut graph).unwrap();
    let before = graph.clone();

    let err = pass.run(&mut graph).unwrap_err();
    assert!(matches!(err, CmoError::AlreadyScheduled { ref node, .. } if node == "w"));
    assert_eq!(graph, before, "labels must not be appended twice");
}

#[test]
fn pass_rejects_non_topological_order() {
    let mut graph = cmo_graph!(MIXED);
    let n1 = graph.find("n1").unwrap();
    let n5 = graph.find("n5").unwrap();
    graph.node_mut(n1).unwrap().inputs[0].peer = Some(OutAnchor { node: n5, index: 0 });

    let err = validate_graph_topology(&graph).unwrap_err();
    assert_eq!(
        err,
        TopologyError::ProducerNotBefore {
            node: "n1".to_string(),
            input: 0,
            producer: n5,
        }
    );

    let err = CmoSchedulePass::default().run(&mut graph).unwrap_err();
    assert!(matches!(err, CmoError::Topology(_)));
    assert!(graph.first_labeled_node().is_none());
}

#[test]
fn dangling_producer_is_a_topology_error() {
    let mut graph = cmo_graph!(MIXED);
    let n2 = graph.find("n2").unwrap();
    graph.node_mut(n2).unwrap().inputs[0].peer = Some(OutAnchor {
        node: NodeId(99),
        index: 0,
    });
    assert!(validate_graph_topology(&graph).is_err());
}

fn edit_json(graph: &Graph, edit: impl FnOnce(&mut serde_json::Value)) -> Graph {
    let mut json = serde_json::to_value(graph).unwrap();
    edit(&mut json);
    serde_json::from_value(json).unwrap()
}

#[test]
fn deserialized_graph_with_swapped_ids_is_rejected() {
    let graph = cmo_graph!(MIXED);
    let mut edited = edit_json(&graph, |json| {
        let nodes = json["nodes"].as_array_mut().unwrap();
        let first = nodes[0]["id"].take();
        nodes[0]["id"] = nodes[1]["id"].take();
        nodes[1]["id"] = first;
    });

    let err = validate_graph_topology(&edited).unwrap_err();
    assert!(
        matches!(
            err,
            TopologyError::IdMismatch { ref node, position: 0, id: NodeId(1) } if node == "w"
        ),
        "unexpected error: {err}"
    );
    let err = CmoSchedulePass::default().run(&mut edited).unwrap_err();
    assert!(matches!(err, CmoError::Topology(TopologyError::IdMismatch { .. })));
    assert!(edited.first_labeled_node().is_none());
}

#[test]
fn deserialized_graph_with_stale_name_index_is_rejected() {
    let graph = cmo_graph!(MIXED);
    let swapped = edit_json(&graph, |json| {
        let names = json["names"].as_object_mut().unwrap();
        let n1 = names["n1"].take();
        names["n1"] = names["n2"].take();
        names["n2"] = n1;
    });
    let err = validate_graph_topology(&swapped).unwrap_err();
    assert!(
        matches!(err, TopologyError::NameMismatch { ref name, .. } if name == "n1"),
        "unexpected error: {err}"
    );

    let extra = edit_json(&graph, |json| {
        json["names"]["ghost"] = serde_json::json!(0);
    });
    assert_eq!(
        validate_graph_topology(&extra).unwrap_err(),
        TopologyError::StaleNameIndex {
            indexed: 7,
            nodes: 6,
        }
    );
}

#[test]
fn schedule_cmo_wraps_errors_with_graph_name() {
    let mut graph = cmo_graph!(MIXED);
    schedule_cmo(&mut graph, &CmoConfig::default()).unwrap();
    let err = schedule_cmo(&mut graph, &CmoConfig::default()).unwrap_err();
    assert!(
        format!("{err:#}").contains("graph `mixed`"),
        "unexpected error: {err:#}"
    );
}

#[test]
fn empty_graph_is_unchanged() {
    let mut graph = Graph::new("empty");
    let result = CmoSchedulePass::default().run(&mut graph).unwrap();
    assert!(!result.changed);
    assert_eq!(result.visited_nodes, 0);
}

#[test]
fn label_table_exports_names_for_the_encoder() {
    let mut graph = cmo_graph!(MIXED);
    CmoSchedulePass::default().run(&mut graph).unwrap();

    let table = CmoLabelTable::from_graph(&graph);
    assert_eq!(table.graph, "mixed");
    assert_eq!(
        table.nodes.keys().map(String::as_str).collect::<Vec<_>>(),
        ["n1", "n4", "w"]
    );
    let writeback = &table.nodes["n4"][&CmoType::Writeback];
    assert_eq!(writeback.len(), 1);
    assert_eq!(writeback[0].node_name, "n5");

    let json: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
    assert_eq!(json["nodes"]["n1"]["Invalid"][0]["node_name"], "n4");
    assert_eq!(json["nodes"]["n1"]["Invalid"][0]["object"], "Output");
}

#[test]
fn scheduled_graph_round_trips_through_json() {
    let mut graph = cmo_graph!(MIXED);
    CmoSchedulePass::default().run(&mut graph).unwrap();
    let json = serde_json::to_string(&graph).unwrap();
    let restored: Graph = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, graph);
    assert_eq!(render_labels(&restored), render_labels(&graph));
}
