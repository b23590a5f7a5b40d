//! The Twin Graph (§4.1): an arena of entities with dense integer indices,
//! a URI→index map, and adjacency lists indexed by arena position (§9's
//! recommended representation). Immutable for the lifetime of a Run.

use indexmap::IndexMap;
use sim_domain::{DomainError, Entity, Relationship};

#[derive(Debug, Clone, Default)]
pub struct TwinGraph {
    entities: Vec<Entity>,
    index_of: IndexMap<String, usize>,
    relationships: Vec<Relationship>,
    /// Relationship indices touching each entity, in insertion order,
    /// outgoing first. Parallel to `entities`.
    incident: Vec<Vec<usize>>,
    by_type: IndexMap<String, Vec<usize>>,
}

impl TwinGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<(), DomainError> {
        if self.index_of.contains_key(&entity.uri) {
            return Err(DomainError::DuplicateEntity(entity.uri));
        }
        let idx = self.entities.len();
        self.index_of.insert(entity.uri.clone(), idx);
        self.entities.push(entity);
        self.incident.push(Vec::new());
        Ok(())
    }

    pub fn add_relationship(&mut self, relationship: Relationship) -> Result<(), DomainError> {
        let source_idx = *self.index_of
                               .get(&relationship.source)
                               .ok_or_else(|| DomainError::DanglingRelationship(relationship.source.clone()))?;
        let target_idx = *self.index_of
                               .get(&relationship.target)
                               .ok_or_else(|| DomainError::DanglingRelationship(relationship.target.clone()))?;
        let rel_idx = self.relationships.len();
        self.by_type.entry(relationship.relationship_type.clone()).or_default().push(rel_idx);
        self.incident[source_idx].push(rel_idx);
        self.incident[target_idx].push(rel_idx);
        self.relationships.push(relationship);
        Ok(())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn get_entity(&self, uri: &str) -> Option<&Entity> {
        self.index_of.get(uri).map(|&i| &self.entities[i])
    }

    pub fn contains_entity(&self, uri: &str) -> bool {
        self.index_of.contains_key(uri)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Relationships touching `uri` (either endpoint), in insertion order.
    pub fn relationships_incident(&self, uri: &str) -> impl Iterator<Item = &Relationship> {
        let rels = match self.index_of.get(uri) {
            Some(&idx) => self.incident[idx].as_slice(),
            None => &[],
        };
        rels.iter().map(move |&i| &self.relationships[i])
    }

    /// Relationships incident to `uri` whose type matches `relationship_type`,
    /// in the twin's enumeration order (§4.4).
    pub fn relationships_incident_of_type<'a>(&'a self, uri: &'a str, relationship_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.relationships_incident(uri).filter(move |r| r.relationship_type == relationship_type)
    }

    pub fn relationships_of_type(&self, relationship_type: &str) -> impl Iterator<Item = &Relationship> {
        let rels = self.by_type.get(relationship_type).map(|v| v.as_slice()).unwrap_or(&[]);
        rels.iter().map(move |&i| &self.relationships[i])
    }

    /// The other endpoint of `relationship` relative to `uri` (§4.4 step 2).
    pub fn other_endpoint<'a>(&self, relationship: &'a Relationship, uri: &str) -> &'a str {
        if relationship.source == uri {
            &relationship.target
        } else {
            &relationship.source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(uri: &str) -> Entity {
        Entity::new(uri, "node", uri).unwrap()
    }

    #[test]
    fn rejects_duplicate_entity() {
        let mut g = TwinGraph::new();
        g.add_entity(entity("a")).unwrap();
        assert!(matches!(g.add_entity(entity("a")), Err(DomainError::DuplicateEntity(_))));
    }

    #[test]
    fn rejects_dangling_relationship() {
        let mut g = TwinGraph::new();
        g.add_entity(entity("a")).unwrap();
        let rel = Relationship::new("r1", "a", "missing", "supplies", 1.0).unwrap();
        assert!(matches!(g.add_relationship(rel), Err(DomainError::DanglingRelationship(_))));
    }

    #[test]
    fn finds_incident_relationships_both_directions() {
        let mut g = TwinGraph::new();
        g.add_entity(entity("a")).unwrap();
        g.add_entity(entity("b")).unwrap();
        g.add_entity(entity("c")).unwrap();
        g.add_relationship(Relationship::new("r1", "a", "b", "supplies", 1.0).unwrap()).unwrap();
        g.add_relationship(Relationship::new("r2", "c", "a", "supplies", 1.0).unwrap()).unwrap();

        let incident: Vec<&str> = g.relationships_incident("a").map(|r| r.id.as_str()).collect();
        assert_eq!(incident, vec!["r1", "r2"]);
    }

    #[test]
    fn other_endpoint_resolves_either_direction() {
        let mut g = TwinGraph::new();
        g.add_entity(entity("a")).unwrap();
        g.add_entity(entity("b")).unwrap();
        let rel = Relationship::new("r1", "a", "b", "supplies", 1.0).unwrap();
        g.add_relationship(rel.clone()).unwrap();
        assert_eq!(g.other_endpoint(&rel, "a"), "b");
        assert_eq!(g.other_endpoint(&rel, "b"), "a");
    }
}
