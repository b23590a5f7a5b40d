//! sim-cli: Command Line Interface for the digital-twin simulation engine.
//!
//! A simple binary that demonstrates the engine end to end. For more
//! advanced usage, see the main binary in the workspace root.

use sim_analysis::TemporalAnalyzer;
use sim_core::{CancellationToken, EngineConfig, SimulationEngine, TwinGraph};
use sim_domain::{Entity, Event, EventSeverity, PropagationRule, PropertyValue, Relationship, Scenario};

fn main() {
    env_logger::init();
    println!("sim-cli");
    println!("=======");

    let mut graph = TwinGraph::new();
    graph.add_entity(Entity::new("supplier-a", "node", "Supplier A").unwrap()).unwrap();
    graph.add_entity(Entity::new("plant-b", "node", "Plant B").unwrap()).unwrap();
    graph.add_relationship(Relationship::new("r1", "supplier-a", "plant-b", "supplies", 1.0).unwrap()).unwrap();

    let event = Event::new("ev1", "demand.surge", "supplier-a", 2, EventSeverity::Medium).with_parameter("increase_factor", PropertyValue::Number(1.8))
                                                                                          .with_rule(PropagationRule::new("supplies", 1.0, 0));
    let scenario = Scenario::new("scn-1", "twin-1", "demo", "demand surge propagating downstream", 15).with_event(event);

    let engine = SimulationEngine::builder().with_config(EngineConfig { snapshot_interval: 1, ..Default::default() }).build();
    let run = engine.run(&graph, &scenario, &CancellationToken::new());

    println!("run {} finished with status {:?}", run.id, run.status);
    if let Some(summary) = &run.summary {
        println!("stability score: {:.2}", summary.stability_score);
        println!("bottlenecks: {:?}", summary.bottlenecks);
        for recommendation in &summary.recommendations {
            println!("  - {recommendation}");
        }
    }

    if let Some(series) = TemporalAnalyzer::analyze_metric(&run.snapshots, "average_utilization") {
        if let Some(trend) = series.trend {
            println!("average_utilization trend: {:?} (slope {:.4}, confidence {:.2})", trend.direction, trend.slope, trend.confidence);
        }
    }
}
