//! Quickstart demo: wires a small Twin and Scenario in-process and runs
//! them through the simulation kernel. This is not a product CLI — see
//! `sim-cli` for the minimal parallel binary, and `sim-persistence` for the
//! Postgres-backed snapshot sink this demo can optionally use.

use sim_analysis::{impact, TemporalAnalyzer};
use sim_core::{CancellationToken, EngineConfig, SimulationEngine, SnapshotSink, TwinGraph};
use sim_domain::{Entity, Event, EventSeverity, PropagationRule, PropertyValue, Relationship, Scenario};

fn build_twin() -> TwinGraph {
    let mut graph = TwinGraph::new();
    graph.add_entity(Entity::new("supplier-a", "node", "Supplier A").unwrap()).unwrap();
    graph.add_entity(Entity::new("plant-b", "node", "Plant B").unwrap()).unwrap();
    graph.add_entity(Entity::new("warehouse-c", "node", "Warehouse C").unwrap()).unwrap();
    graph.add_relationship(Relationship::new("r1", "supplier-a", "plant-b", "supplies", 1.0).unwrap()).unwrap();
    graph.add_relationship(Relationship::new("r2", "plant-b", "warehouse-c", "supplies", 0.6).unwrap()).unwrap();
    graph
}

fn build_scenario() -> Scenario {
    let surge = Event::new("ev1", "demand.surge", "supplier-a", 2, EventSeverity::Medium).with_parameter("increase_factor", PropertyValue::Number(1.8))
                                                                                          .with_rule(PropagationRule::new("supplies", 1.0, 0));
    let outage = Event::new("ev2", "resource.unavailable", "warehouse-c", 10, EventSeverity::High);
    Scenario::new("scn-1", "twin-1", "demo", "demand surge propagating downstream, then a warehouse outage", 25).with_event(surge).with_event(outage)
}

#[cfg(feature = "pg_demo")]
fn snapshot_sink() -> Box<dyn SnapshotSink> {
    match sim_persistence::build_dev_pool_from_env() {
        Ok(pool) => Box::new(sim_persistence::PgSnapshotSink::new(sim_persistence::PoolProvider { pool })),
        Err(err) => {
            log::warn!("pg_demo: falling back to in-memory snapshot sink, pool build failed: {err}");
            Box::new(sim_core::NoopSnapshotSink)
        }
    }
}

#[cfg(not(feature = "pg_demo"))]
fn snapshot_sink() -> Box<dyn SnapshotSink> {
    Box::new(sim_core::InMemorySnapshotSink::new())
}

fn main() {
    env_logger::init();

    let graph = build_twin();
    let scenario = build_scenario();

    let engine = SimulationEngine::builder().with_config(EngineConfig { snapshot_interval: 1, ..Default::default() })
                                             .with_snapshot_sink(snapshot_sink())
                                             .build();
    let run = engine.run(&graph, &scenario, &CancellationToken::new());

    println!("run {} ({:?})", run.id, run.status);
    if let Some(summary) = &run.summary {
        println!("  stability score : {:.2}", summary.stability_score);
        println!("  bottlenecks     : {:?}", summary.bottlenecks);
        println!("  recommendations :");
        for recommendation in &summary.recommendations {
            println!("    - {recommendation}");
        }
    }

    match impact::analyze(&run) {
        Ok(report) => {
            println!("  overall impact  : {:?}", report.overall_impact);
            println!("  risk score      : {:.2}", report.risk_score);
        }
        Err(err) => println!("  impact analysis unavailable: {err}"),
    }

    if let Some(series) = TemporalAnalyzer::analyze_metric(&run.snapshots, "average_utilization") {
        if let Some(trend) = series.trend {
            println!("  utilization trend: {:?} (slope {:.4}, confidence {:.2})", trend.direction, trend.slope, trend.confidence);
        }
        if !series.anomalies.is_empty() {
            println!("  anomalies: {:?}", series.anomalies);
        }
    }
}
