use sim_domain::{DomainError, Entity, Relationship, Scenario};

#[test]
fn entity_rejects_empty_uri() {
    let err = Entity::new("", "warehouse", "Main Warehouse").unwrap_err();
    assert_eq!(err, DomainError::EmptyUri);
}

#[test]
fn relationship_rejects_strength_out_of_range() {
    let err = Relationship::new("r1", "a", "b", "supplies", 1.5).unwrap_err();
    assert!(matches!(err, DomainError::InvalidStrength(_)));
}

#[test]
fn relationship_accepts_boundary_strengths() {
    assert!(Relationship::new("r1", "a", "b", "supplies", 0.0).is_ok());
    assert!(Relationship::new("r2", "a", "b", "supplies", 1.0).is_ok());
}

#[test]
fn scenario_starts_empty() {
    let s = Scenario::new("s1", "t1", "demo", "outage", 0);
    assert!(s.events.is_empty());
    assert_eq!(s.duration, 0);
}
