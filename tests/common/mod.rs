#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crud_pipeline::{
    AuditAction, AuditAugmenter, AuditEntry, ChildAccessor, Clock, Criteria, CrudDto, CrudError,
    CrudService, CrudTypes, Identifiable, InMemoryRepository, LifecycleHooks, MutationHooks,
    PipelineConfig, Result, SerdeMapper, User,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDto {
    pub id: Option<u64>,
    pub name: String,
    pub code: Option<String>,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub audits: Vec<AuditEntry>,
}

impl Identifiable for SampleDto {
    type Id = u64;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

impl CrudDto for SampleDto {
    const UNIQUE_FIELD: Option<&'static str> = Some("code");

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CrudError::validation("name must not be blank"));
        }
        Ok(())
    }

    fn audit_trail_mut(&mut self) -> Option<&mut Vec<AuditEntry>> {
        Some(&mut self.audits)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDomain {
    pub id: Option<u64>,
    pub name: String,
    pub code: Option<String>,
    pub characteristics: Vec<Characteristic>,
    pub audits: Vec<AuditEntry>,
}

impl Identifiable for SampleDomain {
    type Id = u64;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

pub struct Samples;

impl CrudTypes for Samples {
    const ENTITY: &'static str = "sample";
    type Id = u64;
    type User = User;
    type Domain = SampleDomain;
    type Dto = SampleDto;
}

pub fn sample(name: &str) -> SampleDto {
    SampleDto {
        id: None,
        name: name.to_string(),
        code: None,
        characteristics: Vec::new(),
        audits: Vec::new(),
    }
}

pub fn sample_with_code(name: &str, code: &str) -> SampleDto {
    SampleDto {
        code: Some(code.to_string()),
        ..sample(name)
    }
}

pub fn actions(dto: &SampleDto) -> Vec<AuditAction> {
    dto.audits.iter().map(|entry| entry.action_type).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub id: Option<u64>,
    pub key: String,
    pub value: String,
}

impl Identifiable for Characteristic {
    type Id = u64;

    fn id(&self) -> Option<&u64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }
}

pub fn characteristic(key: &str, value: &str) -> Characteristic {
    Characteristic {
        id: None,
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// `(id, key, value)` of every characteristic, in collection order.
pub fn traits(dto: &SampleDto) -> Vec<(u64, String, String)> {
    dto.characteristics
        .iter()
        .map(|c| (c.id.unwrap_or_default(), c.key.clone(), c.value.clone()))
        .collect()
}

/// Accessor over `SampleDto::characteristics`; new children are numbered from 100.
pub struct Characteristics {
    next: AtomicU64,
}

impl Characteristics {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(100),
        }
    }
}

impl ChildAccessor<Samples> for Characteristics {
    type Child = Characteristic;

    const CHILD: &'static str = "characteristic";

    fn children_mut<'a>(&self, parent: &'a mut SampleDto) -> &'a mut Vec<Characteristic> {
        &mut parent.characteristics
    }

    fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

pub struct FixedClock;

impl FixedClock {
    pub fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Self::instant()
    }
}

/// Records every hook stage it sees, as `stage` or `tag:stage`.
pub struct Recorder {
    tag: Option<&'static str>,
    log: Arc<Mutex<Vec<String>>>,
    pub updates: Mutex<Vec<(SampleDto, SampleDto)>>,
    pub removed: Mutex<Vec<SampleDto>>,
    pub loaded_ids: Mutex<Vec<Vec<u64>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_log(None, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_log(tag: Option<&'static str>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            tag,
            log,
            updates: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            loaded_ids: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, stage: &str) {
        let entry = match self.tag {
            Some(tag) => format!("{tag}:{stage}"),
            None => stage.to_string(),
        };
        self.log.lock().unwrap().push(entry);
    }

    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Recorded stages without the read hooks.
    pub fn mutations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|event| !event.ends_with("_get"))
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl LifecycleHooks<Samples> for Recorder {
    async fn before_get(&self, _criteria: &Criteria<u64>, _user: Option<&User>) -> Result<()> {
        self.push("before_get");
        Ok(())
    }

    async fn after_get(
        &self,
        ids: &[u64],
        _dtos: &[SampleDto],
        _criteria: &Criteria<u64>,
        _user: Option<&User>,
    ) -> Result<()> {
        self.loaded_ids.lock().unwrap().push(ids.to_vec());
        self.push("after_get");
        Ok(())
    }

    async fn before_save(&self, _dto: &SampleDto, _user: Option<&User>) -> Result<()> {
        self.push("before_save");
        Ok(())
    }

    async fn after_save(
        &self,
        _dto: &SampleDto,
        _saved: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("after_save");
        Ok(())
    }

    async fn before_update(
        &self,
        _previous: &SampleDto,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("before_update");
        Ok(())
    }

    async fn after_update(
        &self,
        previous: &SampleDto,
        updated: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((previous.clone(), updated.clone()));
        self.push("after_update");
        Ok(())
    }

    async fn before_delete(
        &self,
        _criteria: &Criteria<u64>,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("before_delete");
        Ok(())
    }

    async fn after_delete(
        &self,
        _criteria: &Criteria<u64>,
        removed: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.removed.lock().unwrap().push(removed.clone());
        self.push("after_delete");
        Ok(())
    }
}

#[async_trait]
impl MutationHooks<Samples> for Recorder {
    async fn pre_save(&self, _dto: &SampleDto, _user: Option<&User>) -> Result<()> {
        self.push("pre_save");
        Ok(())
    }

    async fn post_save(
        &self,
        _dto: &SampleDto,
        _saved: &SampleDomain,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("post_save");
        Ok(())
    }

    async fn pre_update(
        &self,
        _previous: &SampleDto,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("pre_update");
        Ok(())
    }

    async fn post_update(
        &self,
        _dto: &SampleDto,
        _updated: &SampleDomain,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("post_update");
        Ok(())
    }

    async fn pre_delete(
        &self,
        _criteria: &Criteria<u64>,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("pre_delete");
        Ok(())
    }

    async fn post_delete(
        &self,
        _criteria: &Criteria<u64>,
        _removed: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.push("post_delete");
        Ok(())
    }
}

/// Mutation strategy failing at one named stage.
pub struct FailAt {
    stage: &'static str,
    error: CrudError,
}

impl FailAt {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            error: CrudError::Hook(format!("{stage} refused")),
        }
    }

    pub fn with_error(stage: &'static str, error: CrudError) -> Self {
        Self { stage, error }
    }

    fn check(&self, stage: &str) -> Result<()> {
        if self.stage == stage {
            Err(self.error.clone())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MutationHooks<Samples> for FailAt {
    async fn pre_save(&self, _dto: &SampleDto, _user: Option<&User>) -> Result<()> {
        self.check("pre_save")
    }

    async fn post_save(
        &self,
        _dto: &SampleDto,
        _saved: &SampleDomain,
        _user: Option<&User>,
    ) -> Result<()> {
        self.check("post_save")
    }

    async fn pre_update(
        &self,
        _previous: &SampleDto,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.check("pre_update")
    }

    async fn post_update(
        &self,
        _dto: &SampleDto,
        _updated: &SampleDomain,
        _user: Option<&User>,
    ) -> Result<()> {
        self.check("post_update")
    }

    async fn pre_delete(
        &self,
        _criteria: &Criteria<u64>,
        _dto: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.check("pre_delete")
    }

    async fn post_delete(
        &self,
        _criteria: &Criteria<u64>,
        _removed: &SampleDto,
        _user: Option<&User>,
    ) -> Result<()> {
        self.check("post_delete")
    }
}

pub struct Fixture {
    pub service: CrudService<Samples>,
    pub repo: Arc<InMemoryRepository<Samples>>,
    pub recorder: Arc<Recorder>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fixture() -> Fixture {
    fixture_with(PipelineConfig::default())
}

pub fn fixture_with(config: PipelineConfig) -> Fixture {
    init_tracing();
    let repo = Arc::new(InMemoryRepository::<Samples>::new());
    let recorder = Arc::new(Recorder::new());
    let service = CrudService::<Samples>::new(repo.clone(), Arc::new(SerdeMapper::<Samples>::new()))
        .with_hooks(recorder.clone())
        .with_domain_hooks(recorder.clone())
        .with_audit(AuditAugmenter::new(Arc::new(FixedClock)))
        .with_config(config);
    Fixture {
        service,
        repo,
        recorder,
    }
}

/// Plain service over `repo` with a failing mutation strategy.
pub fn failing_service(repo: Arc<InMemoryRepository<Samples>>, fail: FailAt) -> CrudService<Samples> {
    CrudService::<Samples>::new(repo, Arc::new(SerdeMapper::<Samples>::new()))
        .with_hooks(Arc::new(fail))
        .with_audit(AuditAugmenter::new(Arc::new(FixedClock)))
}

/// Saves `names` in order and returns the stored DTOs.
pub async fn seed(fixture: &Fixture, names: &[&str]) -> Vec<SampleDto> {
    let mut saved = Vec::new();
    for name in names {
        saved.push(fixture.service.save(sample(name), None).await.unwrap());
    }
    fixture.recorder.clear();
    saved
}
