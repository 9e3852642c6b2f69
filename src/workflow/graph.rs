//! The workflow graph: jobs and paths forming a bipartite DAG.
//!
//! Jobs point at the paths they consume and produce; the registry points
//! back from each path to its producer and consumers. Every mutation
//! validates the structural invariants before committing, so a failed
//! operation leaves the workflow untouched.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::registry::{normalize_path, PathRegistry};
use super::types::{Job, JobOptions, PathList};
use crate::error::{Error, Result};

/// A named collection of jobs over filesystem paths.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    jobs: HashMap<String, Job>,
    registry: PathRegistry,
    job_order: Vec<String>,
}

/// A fully-specified job waiting to be validated and committed.
/// Built by `add_job` and by the deserializer, which supplies an
/// explicit creation timestamp.
pub(crate) struct JobDraft {
    pub id: Option<String>,
    pub template: Option<String>,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub created_at: Option<i64>,
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName(format!("empty {kind}")));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidName(format!(
            "{kind} '{}' contains control characters",
            name.escape_default()
        )));
    }
    Ok(())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Workflow {
    /// Create an empty workflow.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name("workflow name", &name)?;
        debug!(workflow = %name, "created a new workflow");
        Ok(Self {
            name,
            jobs: HashMap::new(),
            registry: PathRegistry::new(),
            job_order: Vec::new(),
        })
    }

    /// Workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the workflow.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("workflow name", &name)?;
        self.name = name;
        Ok(())
    }

    /// Add an abstract job (no template, no data, generated identifier).
    ///
    /// `inputs` and `outputs` each accept a single path or a sequence;
    /// at least one of the two must be non-empty.
    pub fn add_job(
        &mut self,
        inputs: impl Into<PathList>,
        outputs: impl Into<PathList>,
    ) -> Result<String> {
        self.add_job_with(inputs, outputs, JobOptions::new())
    }

    /// Add a job with an explicit identifier, template, or data payload.
    ///
    /// Returns the job identifier, generated as `job_<k>` (smallest free
    /// `k`) when none is supplied.
    pub fn add_job_with(
        &mut self,
        inputs: impl Into<PathList>,
        outputs: impl Into<PathList>,
        options: JobOptions,
    ) -> Result<String> {
        self.insert_job(JobDraft {
            id: options.id,
            template: options.template,
            data: options.data,
            inputs: inputs.into().into_vec(),
            outputs: outputs.into().into_vec(),
            created_at: None,
        })
    }

    pub(crate) fn insert_job(&mut self, draft: JobDraft) -> Result<String> {
        let id = match draft.id {
            Some(id) => {
                validate_name("job identifier", &id)?;
                if self.jobs.contains_key(&id) {
                    return Err(Error::DuplicateJob(id));
                }
                id
            }
            None => self.generate_id(),
        };

        let inputs = normalize_all(&draft.inputs)?;
        let outputs = normalize_all(&draft.outputs)?;

        if inputs.is_empty() && outputs.is_empty() {
            return Err(Error::EmptyJob(id));
        }

        if let Some(path) = first_duplicate(&inputs, &outputs) {
            return Err(Error::DuplicatePath {
                job: id,
                path: path.to_string(),
            });
        }

        for output in &outputs {
            if let Some(producer) = self.registry.producer(output) {
                return Err(Error::DoubleProducer {
                    path: output.clone(),
                    producer: producer.to_string(),
                });
            }
        }

        if self.would_cycle(&id, &inputs, &outputs) {
            return Err(Error::Cycle(id));
        }

        for input in &inputs {
            self.registry.attach_consumer(input, &id);
        }
        for output in &outputs {
            self.registry.attach_producer(output, &id);
        }

        let created_at = draft.created_at.unwrap_or_else(now_ms);
        debug!(
            job = %id,
            inputs = inputs.len(),
            outputs = outputs.len(),
            "job added"
        );
        self.jobs.insert(
            id.clone(),
            Job::new(
                id.clone(),
                draft.template,
                draft.data,
                inputs,
                outputs,
                created_at,
            ),
        );
        self.job_order.push(id.clone());
        Ok(id)
    }

    fn generate_id(&self) -> String {
        let mut k = 0usize;
        loop {
            let candidate = format!("job_{k}");
            if !self.jobs.contains_key(&candidate) {
                return candidate;
            }
            k += 1;
        }
    }

    /// Edges of the job-level graph: producer -> consumer for every path
    /// that is an output of one job and an input of another.
    fn job_edges(&self) -> Vec<(&str, &str)> {
        let mut edges = Vec::new();
        for (_, entry) in self.registry.iter() {
            if let Some(producer) = entry.producer.as_deref() {
                for consumer in &entry.consumers {
                    edges.push((producer, consumer.as_str()));
                }
            }
        }
        edges
    }

    /// Check whether adding a job with these paths would close a cycle in
    /// the prospective job-level graph. Kahn's algorithm on the candidate
    /// edge set: a cycle exists iff some job cannot be discharged.
    fn would_cycle(&self, candidate: &str, inputs: &[String], outputs: &[String]) -> bool {
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for id in self.jobs.keys() {
            indegree.insert(id, 0);
        }
        indegree.insert(candidate, 0);

        let mut edges = self.job_edges();
        for input in inputs {
            if let Some(producer) = self.registry.producer(input) {
                edges.push((producer, candidate));
            }
        }
        for output in outputs {
            if let Some(entry) = self.registry.get(output) {
                for consumer in &entry.consumers {
                    edges.push((candidate, consumer.as_str()));
                }
            }
        }

        for (from, to) in edges {
            successors.entry(from).or_default().push(to);
            *indegree.entry(to).or_insert(0) += 1;
        }

        let mut frontier: Vec<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut discharged = 0usize;
        while let Some(id) = frontier.pop() {
            discharged += 1;
            if let Some(next) = successors.get(id) {
                for to in next {
                    let degree = indegree.get_mut(to).expect("all jobs seeded");
                    *degree -= 1;
                    if *degree == 0 {
                        frontier.push(to);
                    }
                }
            }
        }
        discharged != indegree.len()
    }

    /// Remove a job and drop any path left without producers or consumers.
    pub fn remove_job(&mut self, id: &str) -> Result<()> {
        let job = self
            .jobs
            .remove(id)
            .ok_or_else(|| Error::UnknownJob(id.to_string()))?;
        for path in job.inputs().iter().chain(job.outputs()) {
            self.registry.detach(path, id);
        }
        self.job_order.retain(|j| j != id);
        debug!(job = %id, "job removed");
        Ok(())
    }

    pub fn has_job(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn get_job(&self, id: &str) -> Result<&Job> {
        self.jobs
            .get(id)
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }

    pub fn number_of_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn number_of_paths(&self) -> usize {
        self.registry.len()
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.registry.contains(path)
    }

    /// Producer and consumers of a registered path, or `None` if the path
    /// is not part of this workflow.
    pub fn path_jobs(&self, path: &str) -> Option<(Option<&str>, Vec<&str>)> {
        let entry = self.registry.get(path)?;
        Some((
            entry.producer.as_deref(),
            entry.consumers.iter().map(String::as_str).collect(),
        ))
    }

    /// Paths in insertion order.
    pub fn list_paths(&self) -> Vec<&str> {
        self.registry.paths().collect()
    }

    /// Jobs directly upstream of `id`: the producers of its input paths,
    /// in input order, deduplicated.
    pub fn job_predecessors(&self, id: &str) -> Result<Vec<&str>> {
        let job = self.get_job(id)?;
        let mut seen = HashSet::new();
        let mut predecessors = Vec::new();
        for input in job.inputs() {
            if let Some(producer) = self.registry.producer(input) {
                if seen.insert(producer) {
                    predecessors.push(producer);
                }
            }
        }
        Ok(predecessors)
    }

    /// Jobs directly downstream of `id`: the consumers of its output
    /// paths, in output order, deduplicated.
    pub fn job_successors(&self, id: &str) -> Result<Vec<&str>> {
        let job = self.get_job(id)?;
        let mut seen = HashSet::new();
        let mut successors = Vec::new();
        for output in job.outputs() {
            if let Some(entry) = self.registry.get(output) {
                for consumer in &entry.consumers {
                    if seen.insert(consumer.as_str()) {
                        successors.push(consumer.as_str());
                    }
                }
            }
        }
        Ok(successors)
    }

    /// Jobs in canonical execution order: Kahn-style layering on the
    /// job-level graph, ordered within each layer by creation timestamp,
    /// then identifier. Every export and listing goes through this.
    pub fn sorted_jobs(&self) -> Vec<&Job> {
        let mut indegree: HashMap<&str, usize> =
            self.jobs.keys().map(|id| (id.as_str(), 0)).collect();
        let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
        for (from, to) in self.job_edges() {
            successors.entry(from).or_default().push(to);
            *indegree.get_mut(to).expect("edge endpoints are jobs") += 1;
        }

        let mut layer: Vec<&str> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut ordered = Vec::with_capacity(self.jobs.len());
        while !layer.is_empty() {
            layer.sort_by_key(|id| {
                let job = &self.jobs[*id];
                (job.created_at(), job.id().to_string())
            });
            let mut next = Vec::new();
            for id in layer.drain(..) {
                ordered.push(&self.jobs[id]);
                if let Some(downstream) = successors.get(id) {
                    for to in downstream {
                        let degree = indegree.get_mut(to).expect("seeded");
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(*to);
                        }
                    }
                }
            }
            layer = next;
        }
        debug_assert_eq!(ordered.len(), self.jobs.len(), "graph is acyclic");
        ordered
    }

    /// Job identifiers in execution order. With `outdated_only`, only the
    /// jobs flagged by the outdatedness analysis (which already includes
    /// their transitive descendants) are returned.
    pub fn list_jobs(&self, outdated_only: bool) -> Result<Vec<String>> {
        let ordered = self.sorted_jobs();
        if !outdated_only {
            return Ok(ordered.iter().map(|job| job.id().to_string()).collect());
        }
        let report = super::status::analyze(self)?;
        Ok(ordered
            .iter()
            .filter(|job| report.is_outdated(job.id()))
            .map(|job| job.id().to_string())
            .collect())
    }

    /// Union `other` into this workflow.
    ///
    /// Every job identifier of `other` must be fresh here, and the
    /// combined graph must keep all invariants; on any failure the
    /// receiver is left unchanged.
    pub fn merge(&mut self, other: &Workflow) -> Result<()> {
        let mut merged = self.clone();
        for id in &other.job_order {
            let job = &other.jobs[id];
            merged.insert_job(JobDraft {
                id: Some(job.id().to_string()),
                template: job.template().map(String::from),
                data: job.data().clone(),
                inputs: job.inputs().to_vec(),
                outputs: job.outputs().to_vec(),
                created_at: Some(job.created_at()),
            })?;
        }
        debug!(from = %other.name, into = %self.name, "workflows merged");
        *self = merged;
        Ok(())
    }
}

/// Equality under public observations: same name and same jobs (inputs,
/// outputs, template, data, creation timestamp). Path insertion order is
/// derived state and deliberately not compared.
impl PartialEq for Workflow {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.jobs == other.jobs
    }
}

fn normalize_all(paths: &[String]) -> Result<Vec<String>> {
    paths.iter().map(|path| normalize_path(path)).collect()
}

/// First path appearing twice within either list, or in both lists.
fn first_duplicate<'a>(inputs: &'a [String], outputs: &'a [String]) -> Option<&'a str> {
    let mut seen = HashSet::new();
    for path in inputs {
        if !seen.insert(path.as_str()) {
            return Some(path);
        }
    }
    let inputs_set: HashSet<&str> = inputs.iter().map(String::as_str).collect();
    let mut seen_outputs = HashSet::new();
    for path in outputs {
        if !seen_outputs.insert(path.as_str()) || inputs_set.contains(path.as_str()) {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_workflow() -> Workflow {
        let mut workflow = Workflow::new("example-1").unwrap();
        workflow
            .add_job_with("A", ["B", "C"], JobOptions::new().id("x"))
            .unwrap();
        workflow
            .add_job_with(["A", "C"], "D", JobOptions::new().id("y"))
            .unwrap();
        workflow
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(Workflow::new(""), Err(Error::InvalidName(_))));
        assert!(matches!(
            Workflow::new("bad\nname"),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn test_basic_abstract_workflow() {
        let workflow = example_workflow();
        assert_eq!(workflow.number_of_jobs(), 2);
        assert_eq!(workflow.number_of_paths(), 4);
        let order: Vec<String> = workflow
            .sorted_jobs()
            .iter()
            .map(|job| job.id().to_string())
            .collect();
        assert_eq!(order, vec!["x", "y"]);
    }

    #[test]
    fn test_generated_identifiers_take_smallest_free_slot() {
        let mut workflow = Workflow::new("w").unwrap();
        assert_eq!(workflow.add_job("a", "b").unwrap(), "job_0");
        workflow
            .add_job_with("b", "c", JobOptions::new().id("job_1"))
            .unwrap();
        assert_eq!(workflow.add_job("c", "d").unwrap(), "job_2");
        workflow.remove_job("job_0").unwrap();
        assert_eq!(workflow.add_job("d", "e").unwrap(), "job_0");
    }

    #[test]
    fn test_empty_job_rejected() {
        let mut workflow = Workflow::new("w").unwrap();
        let err = workflow
            .add_job(PathList::none(), PathList::none())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyJob(_)));
        assert_eq!(workflow.number_of_jobs(), 0);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut workflow = example_workflow();
        let err = workflow
            .add_job_with("D", "E", JobOptions::new().id("x"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateJob(_)));
        assert_eq!(workflow.number_of_jobs(), 2);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut workflow = Workflow::new("w").unwrap();
        assert!(matches!(
            workflow.add_job(["a", "a"], "b"),
            Err(Error::DuplicatePath { .. })
        ));
        assert!(matches!(
            workflow.add_job("a", "a"),
            Err(Error::DuplicatePath { .. })
        ));
        assert_eq!(workflow.number_of_paths(), 0);
    }

    #[test]
    fn test_double_producer_rejected_and_workflow_unchanged() {
        let mut workflow = example_workflow();
        let err = workflow
            .add_job_with("A", "B", JobOptions::new().id("z"))
            .unwrap_err();
        match err {
            Error::DoubleProducer { path, producer } => {
                assert_eq!(path, "B");
                assert_eq!(producer, "x");
            }
            other => panic!("expected DoubleProducer, got {other:?}"),
        }
        assert_eq!(workflow.number_of_jobs(), 2);
        assert_eq!(workflow.number_of_paths(), 4);
        assert!(!workflow.has_job("z"));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut workflow = example_workflow();
        let err = workflow
            .add_job_with("D", "A", JobOptions::new().id("z"))
            .unwrap_err();
        assert!(matches!(err, Error::Cycle(_)));
        assert_eq!(workflow.number_of_jobs(), 2);
        assert!(!workflow.has_path("A") || workflow.path_jobs("A").unwrap().0.is_none());
    }

    #[test]
    fn test_self_cycle_rejected() {
        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with("a", "b", JobOptions::new().id("x"))
            .unwrap();
        // b -> a closes the loop through x
        let err = workflow.add_job("b", "a").unwrap_err();
        assert!(matches!(err, Error::Cycle(_)));
    }

    #[test]
    fn test_remove_job_drops_orphan_paths() {
        let mut workflow = example_workflow();
        workflow.remove_job("y").unwrap();
        assert_eq!(workflow.number_of_jobs(), 1);
        // D was only touched by y; A and C survive through x
        assert!(!workflow.has_path("D"));
        assert_eq!(workflow.number_of_paths(), 3);

        assert!(matches!(
            workflow.remove_job("y"),
            Err(Error::UnknownJob(_))
        ));
    }

    #[test]
    fn test_add_then_remove_restores_registry() {
        let mut workflow = example_workflow();
        let before: Vec<String> = workflow.list_paths().iter().map(|s| s.to_string()).collect();
        let id = workflow
            .add_job_with("D", "E", JobOptions::new().id("z"))
            .unwrap();
        workflow.remove_job(&id).unwrap();
        let after: Vec<String> = workflow.list_paths().iter().map(|s| s.to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_predecessors_and_successors() {
        let workflow = example_workflow();
        assert_eq!(workflow.job_predecessors("y").unwrap(), vec!["x"]);
        assert!(workflow.job_predecessors("x").unwrap().is_empty());
        assert_eq!(workflow.job_successors("x").unwrap(), vec!["y"]);
        assert!(workflow.job_successors("y").unwrap().is_empty());
    }

    #[test]
    fn test_path_jobs() {
        let workflow = example_workflow();
        let (producer, consumers) = workflow.path_jobs("C").unwrap();
        assert_eq!(producer, Some("x"));
        assert_eq!(consumers, vec!["y"]);
        assert!(workflow.path_jobs("missing").is_none());
    }

    #[test]
    fn test_paths_are_trimmed_on_the_way_in() {
        let mut workflow = Workflow::new("w").unwrap();
        workflow
            .add_job_with(" a ", "b", JobOptions::new().id("x"))
            .unwrap();
        assert!(workflow.has_path("a"));
        // " a " and "a" are the same path, so this is a duplicate
        assert!(matches!(
            workflow.add_job(["a", " a "], "c"),
            Err(Error::DuplicatePath { .. })
        ));
    }

    #[test]
    fn test_merge_disjoint_workflows() {
        let mut left = example_workflow();
        let mut right = Workflow::new("other").unwrap();
        right
            .add_job_with("D", "E", JobOptions::new().id("z"))
            .unwrap();

        left.merge(&right).unwrap();
        assert_eq!(left.number_of_jobs(), 3);
        assert_eq!(left.job_predecessors("z").unwrap(), vec!["y"]);
    }

    #[test]
    fn test_merge_rejects_duplicate_identifiers_atomically() {
        let mut left = example_workflow();
        let mut right = Workflow::new("other").unwrap();
        right
            .add_job_with("D", "E", JobOptions::new().id("w"))
            .unwrap();
        right
            .add_job_with("E", "F", JobOptions::new().id("x"))
            .unwrap();

        let err = left.merge(&right).unwrap_err();
        assert!(matches!(err, Error::DuplicateJob(_)));
        assert_eq!(left.number_of_jobs(), 2, "merge is atomic");
        assert!(!left.has_job("w"));
    }

    #[test]
    fn test_merge_rejects_double_producer() {
        let mut left = example_workflow();
        let mut right = Workflow::new("other").unwrap();
        right
            .add_job_with("Z", "D", JobOptions::new().id("z"))
            .unwrap();

        assert!(matches!(
            left.merge(&right),
            Err(Error::DoubleProducer { .. })
        ));
        assert_eq!(left.number_of_jobs(), 2);
    }

    #[test]
    fn test_invariants_hold_across_random_mutations() {
        let mut workflow = Workflow::new("churn").unwrap();
        let mut live: Vec<String> = Vec::new();
        for round in 0..30 {
            let input = format!("in_{round}");
            let output = format!("out_{round}");
            let id = workflow.add_job(input.as_str(), output.as_str()).unwrap();
            live.push(id);
            if round % 3 == 2 {
                let id = live.remove(0);
                workflow.remove_job(&id).unwrap();
            }
            // every registered path is referenced by at least one job
            for path in workflow.list_paths() {
                let (producer, consumers) = workflow.path_jobs(path).unwrap();
                assert!(producer.is_some() || !consumers.is_empty());
            }
            assert_eq!(workflow.number_of_jobs(), live.len());
            assert_eq!(workflow.sorted_jobs().len(), live.len());
        }
    }
}
