//! Performance and score trees carried by log entries

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::types::{AssessmentLevel, PerformanceState};

/// One node of a performance tree (task, concept, or sub-concept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceNode {
    /// Node name, unique within a tree
    pub name: String,
    /// Current assessment
    #[serde(default)]
    pub state: PerformanceState,
    /// Child nodes
    #[serde(default)]
    pub children: Vec<PerformanceNode>,
}

impl PerformanceNode {
    /// Create a leaf node
    pub fn new(name: impl Into<String>, state: PerformanceState) -> Self {
        Self {
            name: name.into(),
            state,
            children: Vec::new(),
        }
    }

    /// Add a child, builder style
    pub fn with_child(mut self, child: PerformanceNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Performance tree of a performance-assessment message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceTree {
    /// Top-level task nodes
    pub tasks: Vec<PerformanceNode>,
}

impl PerformanceTree {
    /// Create a tree from its tasks
    pub fn new(tasks: Vec<PerformanceNode>) -> Self {
        Self { tasks }
    }

    /// Finds a node by name, depth first
    pub fn find(&self, name: &str) -> Option<&PerformanceNode> {
        find_in(&self.tasks, name)
    }

    /// Finds a node by name, depth first, for mutation
    pub fn find_mut(&mut self, name: &str) -> Option<&mut PerformanceNode> {
        find_in_mut(&mut self.tasks, name)
    }

    /// The state of the named node
    pub fn state(&self, name: &str) -> Option<&PerformanceState> {
        self.find(name).map(|n| &n.state)
    }

    /// Every node name in the tree
    pub fn node_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        let mut stack: Vec<&PerformanceNode> = self.tasks.iter().collect();
        while let Some(node) = stack.pop() {
            names.insert(node.name.clone());
            stack.extend(node.children.iter());
        }
        names
    }

    /// Depth-first, pre-order walk over every node
    pub fn nodes(&self) -> Vec<&PerformanceNode> {
        let mut out = Vec::new();
        for task in &self.tasks {
            collect(task, &mut out);
        }
        out
    }
}

fn collect<'a>(node: &'a PerformanceNode, out: &mut Vec<&'a PerformanceNode>) {
    out.push(node);
    for child in &node.children {
        collect(child, out);
    }
}

fn find_in<'a>(nodes: &'a [PerformanceNode], name: &str) -> Option<&'a PerformanceNode> {
    for node in nodes {
        if node.name == name {
            return Some(node);
        }
        if let Some(found) = find_in(&node.children, name) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut<'a>(nodes: &'a mut [PerformanceNode], name: &str) -> Option<&'a mut PerformanceNode> {
    for node in nodes.iter_mut() {
        if node.name == name {
            return Some(node);
        }
        if let Some(found) = find_in_mut(&mut node.children, name) {
            return Some(found);
        }
    }
    None
}

/// A graded node of the published score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedScoreNode {
    /// Node name; the root carries the scenario name
    pub name: String,
    /// Grade
    pub grade: AssessmentLevel,
    /// Children
    #[serde(default)]
    pub children: Vec<ScoreNode>,
}

/// A raw measured value of the published score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScoreNode {
    /// Node name
    pub name: String,
    /// Measured value, as recorded
    pub value: String,
    /// Units of the value
    #[serde(default)]
    pub units: String,
    /// Grade
    pub grade: AssessmentLevel,
}

/// Child of a graded score node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreNode {
    /// Graded sub-tree
    Graded(GradedScoreNode),
    /// Raw leaf
    Raw(RawScoreNode),
}

/// The published overall score of a lesson: a terminal snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonScore {
    /// Root of the score tree
    pub root: GradedScoreNode,
}

impl LessonScore {
    /// Create a score from its root
    pub fn new(root: GradedScoreNode) -> Self {
        Self { root }
    }

    /// Name of the scenario this score was published for
    pub fn scenario_name(&self) -> &str {
        &self.root.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> PerformanceTree {
        PerformanceTree::new(vec![
            PerformanceNode::new("Task1", PerformanceState::default())
                .with_child(PerformanceNode::new("Concept1", PerformanceState::default()))
                .with_child(
                    PerformanceNode::new("Concept2", PerformanceState::default())
                        .with_child(PerformanceNode::new("Leaf", PerformanceState::default())),
                ),
            PerformanceNode::new("Task2", PerformanceState::default()),
        ])
    }

    #[test]
    fn test_find_nested() {
        let t = tree();
        assert!(t.find("Leaf").is_some());
        assert!(t.find("Task2").is_some());
        assert!(t.find("Missing").is_none());
    }

    #[test]
    fn test_find_mut_updates_in_place() {
        let mut t = tree();
        t.find_mut("Leaf").unwrap().state.short_term = AssessmentLevel::AtExpectation;
        assert_eq!(
            t.state("Leaf").unwrap().short_term,
            AssessmentLevel::AtExpectation
        );
    }

    #[test]
    fn test_node_names() {
        let names = tree().node_names();
        assert_eq!(names.len(), 5);
        assert!(names.contains("Concept2"));
    }

    #[test]
    fn test_score_serde_shape() {
        let score = LessonScore::new(GradedScoreNode {
            name: "Scenario".into(),
            grade: AssessmentLevel::AtExpectation,
            children: vec![ScoreNode::Raw(RawScoreNode {
                name: "time".into(),
                value: "42".into(),
                units: "s".into(),
                grade: AssessmentLevel::AtExpectation,
            })],
        });
        let json = serde_json::to_string(&score).unwrap();
        assert!(json.contains("\"kind\":\"raw\""));
        let back: LessonScore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, score);
        assert_eq!(back.scenario_name(), "Scenario");
    }
}
