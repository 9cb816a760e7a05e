//! In-memory collaborators for unit tests

use anyhow::{Result, bail};
use async_trait::async_trait;
use gridsweep_core::domain::grid::{JobConfiguration, ParamValue};
use gridsweep_core::domain::job::{
    ConditionStatus, ConditionType, JobDescriptor, JobHandle, JobStatus,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::repository::{
    ArtifactStore, DeployedModelRef, EndpointRef, JobScheduler, ModelRef, ServingPlatform,
    StoreError, SubmissionError,
};

/// Descriptor with artifacts under `gs://test-bucket/{job_id}`
pub(crate) fn descriptor(job_id: &str, index: usize) -> JobDescriptor {
    JobDescriptor {
        index,
        job_id: job_id.to_string(),
        configuration: JobConfiguration::new(vec![(
            "max_depth".to_string(),
            ParamValue::Int(index as i64),
        )]),
        artifact_destination: format!("gs://test-bucket/{}", job_id),
    }
}

#[derive(Default)]
struct SchedulerState {
    scripts: HashMap<String, VecDeque<JobStatus>>,
    current: HashMap<String, JobStatus>,
    complete_false: HashSet<String>,
    logs: HashMap<String, String>,
    rejected: HashSet<String>,
    flaky: HashMap<String, u32>,
    submitted: Vec<String>,
    observations: HashMap<String, u32>,
}

/// Scheduler replaying a scripted status sequence per job
///
/// Each `Complete` query advances the job's script by one status; the last
/// status repeats once the script runs out. Unscripted jobs are Completed.
#[derive(Default)]
pub(crate) struct ScriptedScheduler {
    state: Mutex<SchedulerState>,
}

impl ScriptedScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(mut self, job_id: &str, statuses: Vec<JobStatus>) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .scripts
            .insert(job_id.to_string(), statuses.into());
        self
    }

    /// Reports `Complete=False` for the job
    pub(crate) fn complete_false(mut self, job_id: &str) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .complete_false
            .insert(job_id.to_string());
        self
    }

    pub(crate) fn logs(mut self, job_id: &str, text: &str) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .logs
            .insert(job_id.to_string(), text.to_string());
        self
    }

    pub(crate) fn reject(mut self, job_id: &str) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .rejected
            .insert(job_id.to_string());
        self
    }

    /// Fails the first `failures` condition queries of the job
    pub(crate) fn flaky(mut self, job_id: &str, failures: u32) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .flaky
            .insert(job_id.to_string(), failures);
        self
    }

    pub(crate) fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Number of `Complete` queries made for the job
    pub(crate) fn observations(&self, job_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .observations
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobScheduler for ScriptedScheduler {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<JobHandle, SubmissionError> {
        let mut state = self.state.lock().unwrap();

        if state.rejected.contains(&descriptor.job_id) {
            return Err(SubmissionError::Rejected {
                job_id: descriptor.job_id.clone(),
                reason: "quota exceeded".to_string(),
            });
        }

        state.submitted.push(descriptor.job_id.clone());
        Ok(JobHandle {
            job_id: descriptor.job_id.clone(),
            submitted_at: chrono::Utc::now(),
        })
    }

    async fn condition(&self, job_id: &str, condition: ConditionType) -> Result<ConditionStatus> {
        let mut state = self.state.lock().unwrap();

        if condition == ConditionType::Complete {
            *state.observations.entry(job_id.to_string()).or_default() += 1;

            if let Some(remaining) = state.flaky.get_mut(job_id).filter(|n| **n > 0) {
                *remaining -= 1;
                bail!("connection refused");
            }

            let status = match state.scripts.get_mut(job_id) {
                Some(script) if script.len() > 1 => script.pop_front().unwrap_or(JobStatus::Pending),
                Some(script) => script.front().copied().unwrap_or(JobStatus::Pending),
                None => JobStatus::Completed,
            };
            state.current.insert(job_id.to_string(), status);

            if state.complete_false.contains(job_id) {
                return Ok(ConditionStatus::False);
            }
        }

        let status = state
            .current
            .get(job_id)
            .copied()
            .unwrap_or(JobStatus::Pending);

        let result = match (condition, status) {
            (ConditionType::Complete, JobStatus::Completed) => ConditionStatus::True,
            (ConditionType::Failed, JobStatus::Failed) => ConditionStatus::True,
            (ConditionType::Started, JobStatus::Pending) => ConditionStatus::Unknown,
            (ConditionType::Started, _) => ConditionStatus::True,
            _ => ConditionStatus::Unknown,
        };
        Ok(result)
    }

    async fn log_text(&self, job_id: &str) -> Result<String> {
        match self.state.lock().unwrap().logs.get(job_id) {
            Some(text) => Ok(text.clone()),
            None => bail!("job {} has no pods", job_id),
        }
    }
}

/// Artifact store backed by a map
#[derive(Default)]
pub(crate) struct InMemoryArtifactStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    reads: AtomicUsize,
}

impl InMemoryArtifactStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_blob(mut self, path: &str, bytes: Vec<u8>) -> Self {
        self.blobs.get_mut().unwrap().insert(path.to_string(), bytes);
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write_blob(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.blobs.lock().unwrap().insert(path.to_string(), bytes);
        Ok(())
    }
}

struct FakeDeployment {
    id: String,
    model: String,
    traffic: u32,
}

#[derive(Default)]
struct ServingState {
    endpoints: Vec<EndpointRef>,
    deployments: HashMap<String, Vec<FakeDeployment>>,
    models: Vec<(ModelRef, String)>,
    calls: Vec<&'static str>,
    fail_on: Option<&'static str>,
    next_id: u32,
}

impl ServingState {
    fn call(&mut self, name: &'static str) -> Result<()> {
        self.calls.push(name);
        if self.fail_on == Some(name) {
            bail!("{} failed: 503 Service Unavailable", name);
        }
        Ok(())
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Serving platform that keeps endpoints and models in memory
#[derive(Default)]
pub(crate) struct InMemoryServingPlatform {
    state: Mutex<ServingState>,
}

impl InMemoryServingPlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails every call to the named trait method
    pub(crate) fn failing_on(mut self, method: &'static str) -> Self {
        self.state.get_mut().unwrap().fail_on = Some(method);
        self
    }

    /// Adds an endpoint serving the given deployed models with traffic split evenly
    ///
    /// The first model absorbs the rounding remainder.
    pub(crate) fn with_endpoint(mut self, name: &str, deployed: &[&str]) -> Self {
        let state = self.state.get_mut().unwrap();
        let id = format!("endpoints/{}", state.next_id());
        state.endpoints.push(EndpointRef {
            id: id.clone(),
            display_name: name.to_string(),
        });

        let share = 100 / deployed.len().max(1) as u32;
        let remainder = 100 - share * deployed.len() as u32;
        state.deployments.insert(
            id,
            deployed
                .iter()
                .enumerate()
                .map(|(i, d)| FakeDeployment {
                    id: d.to_string(),
                    model: d.to_string(),
                    traffic: if i == 0 { share + remainder } else { share },
                })
                .collect(),
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn endpoints(&self) -> Vec<EndpointRef> {
        self.state.lock().unwrap().endpoints.clone()
    }

    /// (model display name, traffic percent) served by an endpoint
    pub(crate) fn deployed_on(&self, endpoint_name: &str) -> Vec<(String, u32)> {
        let state = self.state.lock().unwrap();
        state
            .endpoints
            .iter()
            .find(|e| e.display_name == endpoint_name)
            .and_then(|e| state.deployments.get(&e.id))
            .map(|d| d.iter().map(|d| (d.model.clone(), d.traffic)).collect())
            .unwrap_or_default()
    }

    /// Artifact folder a model was registered from
    pub(crate) fn model_artifact(&self, model_name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .models
            .iter()
            .rev()
            .find(|(m, _)| m.display_name == model_name)
            .map(|(_, artifact)| artifact.clone())
    }
}

#[async_trait]
impl ServingPlatform for InMemoryServingPlatform {
    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointRef>> {
        let mut state = self.state.lock().unwrap();
        state.call("find_endpoint")?;
        Ok(state
            .endpoints
            .iter()
            .find(|e| e.display_name == name)
            .cloned())
    }

    async fn create_endpoint(&self, name: &str) -> Result<EndpointRef> {
        let mut state = self.state.lock().unwrap();
        state.call("create_endpoint")?;
        let endpoint = EndpointRef {
            id: format!("endpoints/{}", state.next_id()),
            display_name: name.to_string(),
        };
        state.endpoints.push(endpoint.clone());
        state.deployments.insert(endpoint.id.clone(), Vec::new());
        Ok(endpoint)
    }

    async fn register_model(&self, name: &str, artifact_path: &str) -> Result<ModelRef> {
        let mut state = self.state.lock().unwrap();
        state.call("register_model")?;
        let model = ModelRef {
            id: format!("models/{}", state.next_id()),
            display_name: name.to_string(),
        };
        state.models.push((model.clone(), artifact_path.to_string()));
        Ok(model)
    }

    async fn list_deployed_models(&self, endpoint: &EndpointRef) -> Result<Vec<DeployedModelRef>> {
        let mut state = self.state.lock().unwrap();
        state.call("list_deployed_models")?;
        Ok(state
            .deployments
            .get(&endpoint.id)
            .map(|d| {
                d.iter()
                    .map(|d| DeployedModelRef {
                        id: d.id.clone(),
                        traffic_percent: d.traffic,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Enforces the platform's traffic rules: a model that still receives
    /// traffic can only be removed alongside a split that covers the rest
    async fn undeploy(
        &self,
        endpoint: &EndpointRef,
        deployed_model_id: &str,
        remaining_split: &HashMap<String, u32>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("undeploy")?;
        let Some(deployed) = state.deployments.get_mut(&endpoint.id) else {
            bail!("endpoint {} not found", endpoint.id);
        };
        let Some(position) = deployed.iter().position(|d| d.id == deployed_model_id) else {
            bail!("{} is not deployed on {}", deployed_model_id, endpoint.id);
        };

        if deployed.len() > 1 {
            if remaining_split.is_empty() {
                if deployed[position].traffic > 0 {
                    bail!(
                        "{} still receives {}% of traffic",
                        deployed_model_id,
                        deployed[position].traffic
                    );
                }
            } else if remaining_split.contains_key(deployed_model_id) {
                bail!("traffic split still routes to {}", deployed_model_id);
            } else if remaining_split.values().sum::<u32>() != 100 {
                bail!("traffic split must sum to 100");
            }
        }

        deployed.remove(position);
        if !remaining_split.is_empty() {
            for d in deployed.iter_mut() {
                d.traffic = remaining_split.get(&d.id).copied().unwrap_or(0);
            }
        }
        Ok(())
    }

    async fn deploy(
        &self,
        endpoint: &EndpointRef,
        model: &ModelRef,
        traffic_percent: u32,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.call("deploy")?;
        let id = format!("deployed-{}", state.next_id());
        let Some(deployed) = state.deployments.get_mut(&endpoint.id) else {
            bail!("endpoint {} not found", endpoint.id);
        };
        if traffic_percent == 100 {
            deployed.iter_mut().for_each(|d| d.traffic = 0);
        }
        deployed.push(FakeDeployment {
            id: id.clone(),
            model: model.display_name.clone(),
            traffic: traffic_percent,
        });
        Ok(id)
    }

    async fn predict(
        &self,
        _endpoint: &EndpointRef,
        instances: Vec<serde_json::Value>,
    ) -> Result<Vec<serde_json::Value>> {
        let mut state = self.state.lock().unwrap();
        state.call("predict")?;
        Ok(instances.iter().map(|_| serde_json::json!(0.0)).collect())
    }
}
