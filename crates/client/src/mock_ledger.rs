//! # Mock Ledger
//!
//! In-memory, deterministic ledger implementing [`RegistryReader`], with
//! [`MockSigner`] providing [`LedgerWriter`] for one identity. No network.
//!
//! The mock enforces the registries' own rules so that client-side guards
//! and ledger-side rejections can be tested against each other. Rejection
//! reasons use the phrasing of the deployed contracts, including the
//! settlement defect: when the reward manager's settlement-caller
//! reference does not point at the report registry, finalizing an appeal
//! is refused by the reward manager with
//! `"caller is not the authorized settlement registry"`.
//!
//! ## Failure injection
//!
//! | Hook | Effect |
//! |------|--------|
//! | [`push_estimate_failure`](MockLedger::push_estimate_failure) | next estimate fails (FIFO) |
//! | [`push_submit_failure`](MockLedger::push_submit_failure) | next submission fails (FIFO) |
//! | [`fail_reads`](MockLedger::fail_reads) | every read fails with `Network` |
//! | [`fail_verdict_decode`](MockLedger::fail_verdict_decode) | one verdict record is undecodable |
//! | [`set_revert_on_receipt`](MockLedger::set_revert_on_receipt) | rejected calls are accepted and revert at receipt time with a generic reason |
//! | [`set_link`](MockLedger::set_link) | break one registry cross-reference |

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use lapor_common::{
    default_links, Address, ClientConfig, Deployment, Institution, InstitutionId,
    RawVerdictRecord, RegistryKind, Report, ReportId, ReportStatus, StakePosition,
};

use crate::ledger::{
    methods, Confirmation, LedgerCall, LedgerWriter, ReadError, RegistryReader, Rejection,
    SimulationOutcome, SubmitError, TxHash,
};

/// Owner of [`MockLedger::new`]'s deployment.
pub const MOCK_OWNER: Address = Address::new([0x01; 20]);

/// Token stake an appeal requires unless overridden: 10 tokens at 18 decimals.
pub const DEFAULT_APPEAL_STAKE: u128 = 10_000_000_000_000_000_000;

const GENESIS_TIME: u64 = 1_700_000_000;

/// Deployment used by [`MockLedger::new`].
#[must_use]
pub fn mock_deployment() -> Deployment {
    Deployment {
        institution_registry: Address::repeat(0xd1),
        report_registry: Address::repeat(0xd2),
        validator_registry: Address::repeat(0xd3),
        reward_manager: Address::repeat(0xd4),
        token: Address::repeat(0xd5),
    }
}

/// Execution cost the mock charges per entry point.
fn method_cost(method: &str) -> u64 {
    match method {
        methods::CREATE_REPORT => 180_000,
        methods::VALIDATE_REPORT => 150_000,
        methods::SUBMIT_APPEAL => 120_000,
        methods::FINALIZE_APPEAL => 140_000,
        methods::REGISTER_INSTITUTION => 160_000,
        methods::STAKE => 90_000,
        methods::UNSTAKE | methods::ADD_VALIDATOR | methods::ADD_REPORTER => 70_000,
        methods::TRANSFER => 52_000,
        methods::APPROVE => 46_000,
        _ => 100_000,
    }
}

/// A call the mock accepted for inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedCall {
    pub from: Address,
    pub call: LedgerCall,
    pub cost_ceiling: u64,
    pub tx: TxHash,
}

// ════════════════════════════════════════════════════════════════════════════════
// WORLD STATE
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct InstitutionEntry {
    institution: Institution,
    validators: Vec<Address>,
    reporters: Vec<Address>,
}

#[derive(Debug, Clone)]
enum VerdictSlot {
    Stored(RawVerdictRecord),
    Undecodable(String),
}

/// Contract state. Cloned for dry runs.
#[derive(Debug, Clone)]
struct World {
    owner: Address,
    deployment: Deployment,
    institutions: BTreeMap<InstitutionId, InstitutionEntry>,
    reports: BTreeMap<ReportId, Report>,
    verdicts: HashMap<ReportId, VerdictSlot>,
    stakes: HashMap<Address, u128>,
    minimum_stake: u128,
    appeal_stake: u128,
    /// Stake locked per appealed report: (reporter, amount).
    appeal_escrow: HashMap<ReportId, (Address, u128)>,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    pool: u128,
    links: HashMap<(RegistryKind, RegistryKind), Address>,
    block: u64,
    now: u64,
}

fn reject(reason: &str, origin: RegistryKind) -> Rejection {
    Rejection::new(reason, Some(origin))
}

impl World {
    fn new(owner: Address, deployment: Deployment) -> Self {
        let links = default_links()
            .into_iter()
            .map(|l| ((l.from, l.to), deployment.address_of(l.to)))
            .collect();
        Self {
            owner,
            deployment,
            institutions: BTreeMap::new(),
            reports: BTreeMap::new(),
            verdicts: HashMap::new(),
            stakes: HashMap::new(),
            minimum_stake: 0,
            appeal_stake: DEFAULT_APPEAL_STAKE,
            appeal_escrow: HashMap::new(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            pool: 0,
            links,
            block: 1,
            now: GENESIS_TIME,
        }
    }

    fn link_ok(&self, from: RegistryKind, to: RegistryKind) -> bool {
        self.links.get(&(from, to)) == Some(&self.deployment.address_of(to))
    }

    fn balance(&self, a: &Address) -> u128 {
        self.balances.get(a).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: Address, spender: Address) -> u128 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    fn credit(&mut self, a: Address, amount: u128) {
        let b = self.balances.entry(a).or_insert(0);
        *b = b.saturating_add(amount);
    }

    fn institution_entry(&self, id: InstitutionId, origin: RegistryKind) -> Result<&InstitutionEntry, Rejection> {
        self.institutions
            .get(&id)
            .ok_or_else(|| reject("institution not found", origin))
    }

    /// Applies `call` from `from`. Rejections leave `self` untouched.
    fn apply(&mut self, from: Address, call: &LedgerCall) -> Result<(), Rejection> {
        if self.deployment.address_of(call.target) != call.to {
            return Err(Rejection::new("no contract code at target address", None));
        }
        let malformed = || reject("malformed call arguments", call.target);
        let uint = |i: usize| call.arg_uint(i).ok_or_else(malformed);
        let id = |i: usize| {
            call.arg_uint(i)
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(malformed)
        };
        let addr = |i: usize| call.arg_address(i).ok_or_else(malformed);
        let flag = |i: usize| call.arg_bool(i).ok_or_else(malformed);
        let text = |i: usize| call.arg_text(i).map(str::to_string).ok_or_else(malformed);

        use RegistryKind::*;
        match call.method {
            methods::CREATE_REPORT => {
                let institution_id = id(0)?;
                let (title, description) = (text(1)?, text(2)?);
                if !self.link_ok(ReportRegistry, InstitutionRegistry) {
                    return Err(reject("institution registry address mismatch", ReportRegistry));
                }
                let entry = self.institution_entry(institution_id, ReportRegistry)?;
                if !entry.reporters.contains(&from) {
                    return Err(reject("caller is not a registered reporter", ReportRegistry));
                }
                let assigned_validator = entry.validators.first().copied();
                let report_id = self.reports.keys().next_back().copied().unwrap_or(0) + 1;
                self.reports.insert(
                    report_id,
                    Report {
                        id: report_id,
                        institution_id,
                        title,
                        description,
                        reporter: from,
                        assigned_validator,
                        status: ReportStatus::Pending,
                        appealed: false,
                        created_at: self.now,
                    },
                );
            }
            methods::VALIDATE_REPORT => {
                let (report_id, is_valid, description) = (id(0)?, flag(1)?, text(2)?);
                let report = self
                    .reports
                    .get(&report_id)
                    .ok_or_else(|| reject("report not found", ValidatorRegistry))?;
                if !self.link_ok(ValidatorRegistry, ReportRegistry) {
                    return Err(reject("only validator registry may record verdicts", ReportRegistry));
                }
                let entry = self.institution_entry(report.institution_id, ValidatorRegistry)?;
                if !entry.validators.contains(&from) {
                    return Err(reject("caller is not a registered validator", ValidatorRegistry));
                }
                if report.assigned_validator.is_some_and(|v| v != from) {
                    return Err(reject("caller is not the assigned validator", ValidatorRegistry));
                }
                if report.status != ReportStatus::Pending {
                    return Err(reject("report is not pending", ReportRegistry));
                }
                if self.stakes.get(&from).copied().unwrap_or(0) < self.minimum_stake {
                    return Err(reject("insufficient stake", RewardManager));
                }
                let now = self.now;
                if let Some(r) = self.reports.get_mut(&report_id) {
                    r.status = if is_valid {
                        ReportStatus::Valid
                    } else {
                        ReportStatus::Invalid
                    };
                }
                self.verdicts.insert(
                    report_id,
                    VerdictSlot::Stored(RawVerdictRecord::decoded(
                        from.to_string(),
                        is_valid,
                        description,
                        now,
                    )),
                );
            }
            methods::SUBMIT_APPEAL => {
                let report_id = id(0)?;
                let report = self
                    .reports
                    .get(&report_id)
                    .ok_or_else(|| reject("report not found", ReportRegistry))?;
                if report.reporter != from {
                    return Err(reject("only the reporter can appeal", ReportRegistry));
                }
                if report.appealed {
                    return Err(reject("report already appealed", ReportRegistry));
                }
                if report.status != ReportStatus::Invalid {
                    return Err(reject("report is not invalid", ReportRegistry));
                }
                if !self.link_ok(ReportRegistry, RewardManager) {
                    return Err(reject("reward manager address mismatch", ReportRegistry));
                }
                let stake = self.appeal_stake;
                let manager = self.deployment.reward_manager;
                if self.balance(&from) < stake {
                    return Err(reject("ERC20: transfer amount exceeds balance", Token));
                }
                if self.allowance(from, manager) < stake {
                    return Err(reject("ERC20: insufficient allowance", Token));
                }
                let (balance, allowance) = (self.balance(&from), self.allowance(from, manager));
                self.balances.insert(from, balance - stake);
                self.allowances.insert((from, manager), allowance - stake);
                self.pool = self.pool.saturating_add(stake);
                self.appeal_escrow.insert(report_id, (from, stake));
                if let Some(r) = self.reports.get_mut(&report_id) {
                    r.status = ReportStatus::Appealed;
                    r.appealed = true;
                }
            }
            methods::FINALIZE_APPEAL => {
                let (report_id, is_valid) = (id(0)?, flag(1)?);
                let report = self
                    .reports
                    .get(&report_id)
                    .ok_or_else(|| reject("report not found", ReportRegistry))?;
                let entry = self.institution_entry(report.institution_id, ReportRegistry)?;
                if entry.institution.admin != from {
                    return Err(reject("caller is not the institution admin", ReportRegistry));
                }
                if report.status != ReportStatus::Appealed {
                    return Err(reject("report is not under appeal", ReportRegistry));
                }
                if !self.link_ok(RewardManager, ReportRegistry) {
                    return Err(reject(
                        "caller is not the authorized settlement registry",
                        RewardManager,
                    ));
                }
                let treasury = entry.institution.treasury;
                let (reporter, stake) = self
                    .appeal_escrow
                    .get(&report_id)
                    .copied()
                    .unwrap_or((report.reporter, 0));
                if self.pool < stake {
                    return Err(reject("insufficient pool balance", RewardManager));
                }
                self.pool -= stake;
                self.credit(if is_valid { reporter } else { treasury }, stake);
                self.appeal_escrow.remove(&report_id);
                if let Some(r) = self.reports.get_mut(&report_id) {
                    r.status = if is_valid {
                        ReportStatus::Valid
                    } else {
                        ReportStatus::Invalid
                    };
                }
            }
            methods::STAKE => {
                let amount = uint(0)?;
                if !self.link_ok(RewardManager, Token) {
                    return Err(reject("stake token address mismatch", RewardManager));
                }
                let manager = self.deployment.reward_manager;
                if self.balance(&from) < amount {
                    return Err(reject("ERC20: transfer amount exceeds balance", Token));
                }
                if self.allowance(from, manager) < amount {
                    return Err(reject("ERC20: insufficient allowance", Token));
                }
                let (balance, allowance) = (self.balance(&from), self.allowance(from, manager));
                self.balances.insert(from, balance - amount);
                self.allowances.insert((from, manager), allowance - amount);
                let s = self.stakes.entry(from).or_insert(0);
                *s = s.saturating_add(amount);
            }
            methods::UNSTAKE => {
                let amount = uint(0)?;
                let staked = self.stakes.get(&from).copied().unwrap_or(0);
                if staked < amount {
                    return Err(reject("insufficient stake", RewardManager));
                }
                self.stakes.insert(from, staked - amount);
                self.credit(from, amount);
            }
            methods::TRANSFER => {
                let (to, amount) = (addr(0)?, uint(1)?);
                if self.balance(&from) < amount {
                    return Err(reject("ERC20: transfer amount exceeds balance", Token));
                }
                let balance = self.balance(&from);
                self.balances.insert(from, balance - amount);
                self.credit(to, amount);
            }
            methods::APPROVE => {
                let (spender, amount) = (addr(0)?, uint(1)?);
                self.allowances.insert((from, spender), amount);
            }
            methods::REGISTER_INSTITUTION => {
                let (name, admin, treasury) = (text(0)?, addr(1)?, addr(2)?);
                if from != self.owner {
                    return Err(reject("only owner can register institutions", InstitutionRegistry));
                }
                self.push_institution(name, admin, treasury);
            }
            methods::ADD_VALIDATOR | methods::ADD_REPORTER => {
                let (institution_id, member) = (id(0)?, addr(1)?);
                let owner = self.owner;
                let entry = self
                    .institutions
                    .get_mut(&institution_id)
                    .ok_or_else(|| reject("institution not found", InstitutionRegistry))?;
                if from != entry.institution.admin && from != owner {
                    return Err(reject("only admin of the institution", InstitutionRegistry));
                }
                let list = if call.method == methods::ADD_VALIDATOR {
                    &mut entry.validators
                } else {
                    &mut entry.reporters
                };
                if !list.contains(&member) {
                    list.push(member);
                }
            }
            other => {
                return Err(Rejection::new(format!("unknown entry point {other}"), Some(call.target)));
            }
        }

        self.block += 1;
        self.now += 12;
        Ok(())
    }

    fn push_institution(&mut self, name: String, admin: Address, treasury: Address) -> InstitutionId {
        let id = self.institutions.keys().next_back().copied().unwrap_or(0) + 1;
        self.institutions.insert(
            id,
            InstitutionEntry {
                institution: Institution {
                    id,
                    name,
                    admin,
                    treasury,
                },
                validators: Vec::new(),
                reporters: Vec::new(),
            },
        );
        id
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// MOCK LEDGER
// ════════════════════════════════════════════════════════════════════════════════

struct Inner {
    world: World,
    estimate_failures: VecDeque<SubmitError>,
    submit_failures: VecDeque<SubmitError>,
    read_failure: Option<String>,
    revert_on_receipt: bool,
    submitted: Vec<SubmittedCall>,
    receipts: HashMap<TxHash, Confirmation>,
    estimate_calls: usize,
    simulate_calls: usize,
    report_reads: usize,
    nonce: u64,
}

/// In-memory ledger. Share it through `Arc`.
pub struct MockLedger {
    inner: Mutex<Inner>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Empty ledger on [`mock_deployment`], owned by [`MOCK_OWNER`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_deployment(MOCK_OWNER, mock_deployment())
    }

    #[must_use]
    pub fn with_deployment(owner: Address, deployment: Deployment) -> Self {
        Self {
            inner: Mutex::new(Inner {
                world: World::new(owner, deployment),
                estimate_failures: VecDeque::new(),
                submit_failures: VecDeque::new(),
                read_failure: None,
                revert_on_receipt: false,
                submitted: Vec::new(),
                receipts: HashMap::new(),
                estimate_calls: 0,
                report_reads: 0,
                simulate_calls: 0,
                nonce: 0,
            }),
        }
    }

    /// Client config matching this ledger's owner and deployment.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let inner = self.inner.lock();
        ClientConfig::for_deployment(inner.world.owner, inner.world.deployment.clone())
    }

    #[must_use]
    pub fn deployment(&self) -> Deployment {
        self.inner.lock().world.deployment.clone()
    }

    /// Writer that signs as `signer`.
    #[must_use]
    pub fn signer(self: &Arc<Self>, signer: Address) -> MockSigner {
        MockSigner {
            ledger: Arc::clone(self),
            signer,
        }
    }

    // ── Seeding ──────────────────────────────────────────────────────────────

    pub fn add_institution(&self, name: &str, admin: Address, treasury: Address) -> InstitutionId {
        self.inner
            .lock()
            .world
            .push_institution(name.to_string(), admin, treasury)
    }

    /// Overwrites an institution's admin. Seeding only; the registries
    /// expose no admin transfer.
    pub fn set_institution_admin(&self, id: InstitutionId, admin: Address) {
        if let Some(e) = self.inner.lock().world.institutions.get_mut(&id) {
            e.institution.admin = admin;
        }
    }

    pub fn add_validator(&self, id: InstitutionId, validator: Address) {
        if let Some(e) = self.inner.lock().world.institutions.get_mut(&id) {
            if !e.validators.contains(&validator) {
                e.validators.push(validator);
            }
        }
    }

    pub fn add_reporter(&self, id: InstitutionId, reporter: Address) {
        if let Some(e) = self.inner.lock().world.institutions.get_mut(&id) {
            if !e.reporters.contains(&reporter) {
                e.reporters.push(reporter);
            }
        }
    }

    /// Inserts or replaces a report under its own id.
    pub fn insert_report(&self, report: Report) {
        self.inner.lock().world.reports.insert(report.id, report);
    }

    pub fn set_verdict_record(&self, report_id: ReportId, record: RawVerdictRecord) {
        self.inner
            .lock()
            .world
            .verdicts
            .insert(report_id, VerdictSlot::Stored(record));
    }

    /// Makes the verdict record of `report_id` fail to decode as a whole.
    pub fn fail_verdict_decode(&self, report_id: ReportId, detail: &str) {
        self.inner
            .lock()
            .world
            .verdicts
            .insert(report_id, VerdictSlot::Undecodable(detail.to_string()));
    }

    pub fn set_balance(&self, owner: Address, amount: u128) {
        self.inner.lock().world.balances.insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: u128) {
        self.inner
            .lock()
            .world
            .allowances
            .insert((owner, spender), amount);
    }

    pub fn set_pool(&self, amount: u128) {
        self.inner.lock().world.pool = amount;
    }

    pub fn set_stake(&self, validator: Address, amount: u128) {
        self.inner.lock().world.stakes.insert(validator, amount);
    }

    pub fn set_minimum_stake(&self, amount: u128) {
        self.inner.lock().world.minimum_stake = amount;
    }

    pub fn set_appeal_stake(&self, amount: u128) {
        self.inner.lock().world.appeal_stake = amount;
    }

    /// Points `from`'s stored reference to `to` at `address`.
    pub fn set_link(&self, from: RegistryKind, to: RegistryKind, address: Address) {
        self.inner.lock().world.links.insert((from, to), address);
    }

    // ── Failure injection ────────────────────────────────────────────────────

    pub fn push_estimate_failure(&self, error: SubmitError) {
        self.inner.lock().estimate_failures.push_back(error);
    }

    pub fn push_submit_failure(&self, error: SubmitError) {
        self.inner.lock().submit_failures.push_back(error);
    }

    pub fn fail_reads(&self, reason: &str) {
        self.inner.lock().read_failure = Some(reason.to_string());
    }

    pub fn restore_reads(&self) {
        self.inner.lock().read_failure = None;
    }

    pub fn set_revert_on_receipt(&self, enabled: bool) {
        self.inner.lock().revert_on_receipt = enabled;
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn report_snapshot(&self, id: ReportId) -> Option<Report> {
        self.inner.lock().world.reports.get(&id).cloned()
    }

    #[must_use]
    pub fn balance_of(&self, owner: Address) -> u128 {
        self.inner.lock().world.balance(&owner)
    }

    #[must_use]
    pub fn pool(&self) -> u128 {
        self.inner.lock().world.pool
    }

    #[must_use]
    pub fn submitted(&self) -> Vec<SubmittedCall> {
        self.inner.lock().submitted.clone()
    }

    #[must_use]
    pub fn estimate_calls(&self) -> usize {
        self.inner.lock().estimate_calls
    }

    #[must_use]
    pub fn simulate_calls(&self) -> usize {
        self.inner.lock().simulate_calls
    }

    /// Number of single-report reads served, failed ones included.
    #[must_use]
    pub fn report_reads(&self) -> usize {
        self.inner.lock().report_reads
    }

    fn read<T>(&self, f: impl FnOnce(&World) -> Result<T, ReadError>) -> Result<T, ReadError> {
        let inner = self.inner.lock();
        if let Some(reason) = &inner.read_failure {
            return Err(ReadError::Network(reason.clone()));
        }
        f(&inner.world)
    }

    fn tx_hash(nonce: u64, from: &Address, call: &LedgerCall) -> TxHash {
        let mut hasher = Keccak256::new();
        hasher.update(nonce.to_be_bytes());
        hasher.update(from.as_bytes());
        hasher.update(call.to.as_bytes());
        hasher.update(call.method.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        TxHash(out)
    }

    fn submit_as(&self, from: Address, call: &LedgerCall, ceiling: u64) -> Result<TxHash, SubmitError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.submit_failures.pop_front() {
            return Err(err);
        }

        inner.nonce += 1;
        let tx = Self::tx_hash(inner.nonce, &from, call);

        let outcome = if ceiling < method_cost(call.method) {
            Err(Rejection::new("out of gas", None))
        } else {
            let mut scratch = inner.world.clone();
            scratch.apply(from, call).map(|()| scratch)
        };

        let confirmation = match outcome {
            Ok(next) => {
                inner.world = next;
                Confirmation::Confirmed {
                    block: inner.world.block,
                }
            }
            // Receipts carry no reason; only a dry run recovers it.
            Err(_) if inner.revert_on_receipt => Confirmation::Reverted {
                rejection: Rejection::new("execution reverted", None),
            },
            Err(rejection) => return Err(SubmitError::Rejected(rejection)),
        };

        inner.receipts.insert(tx, confirmation);
        inner.submitted.push(SubmittedCall {
            from,
            call: call.clone(),
            cost_ceiling: ceiling,
            tx,
        });
        Ok(tx)
    }

    fn estimate_as(&self, from: Address, call: &LedgerCall) -> Result<u64, SubmitError> {
        let mut inner = self.inner.lock();
        inner.estimate_calls += 1;
        if let Some(err) = inner.estimate_failures.pop_front() {
            return Err(err);
        }
        let mut scratch = inner.world.clone();
        scratch
            .apply(from, call)
            .map(|()| method_cost(call.method))
            .map_err(SubmitError::Rejected)
    }
}

#[async_trait]
impl RegistryReader for MockLedger {
    async fn institution_count(&self) -> Result<u64, ReadError> {
        self.read(|w| Ok(w.institutions.len() as u64))
    }

    async fn institution(&self, id: InstitutionId) -> Result<Institution, ReadError> {
        self.read(|w| {
            w.institutions
                .get(&id)
                .map(|e| e.institution.clone())
                .ok_or_else(|| ReadError::NotFound(format!("institution {id}")))
        })
    }

    async fn is_validator(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError> {
        self.read(|w| {
            Ok(w.institutions
                .get(&institution_id)
                .is_some_and(|e| e.validators.contains(&address)))
        })
    }

    async fn is_reporter(&self, institution_id: InstitutionId, address: Address) -> Result<bool, ReadError> {
        self.read(|w| {
            Ok(w.institutions
                .get(&institution_id)
                .is_some_and(|e| e.reporters.contains(&address)))
        })
    }

    async fn validators(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError> {
        self.read(|w| {
            w.institutions
                .get(&institution_id)
                .map(|e| e.validators.clone())
                .ok_or_else(|| ReadError::NotFound(format!("institution {institution_id}")))
        })
    }

    async fn reporters(&self, institution_id: InstitutionId) -> Result<Vec<Address>, ReadError> {
        self.read(|w| {
            w.institutions
                .get(&institution_id)
                .map(|e| e.reporters.clone())
                .ok_or_else(|| ReadError::NotFound(format!("institution {institution_id}")))
        })
    }

    async fn report_count(&self) -> Result<u64, ReadError> {
        self.read(|w| Ok(w.reports.keys().next_back().copied().unwrap_or(0)))
    }

    async fn report(&self, id: ReportId) -> Result<Report, ReadError> {
        self.inner.lock().report_reads += 1;
        self.read(|w| {
            w.reports
                .get(&id)
                .cloned()
                .ok_or_else(|| ReadError::NotFound(format!("report {id}")))
        })
    }

    async fn verdict_record(&self, report_id: ReportId) -> Result<Option<RawVerdictRecord>, ReadError> {
        self.read(|w| match w.verdicts.get(&report_id) {
            None => Ok(None),
            Some(VerdictSlot::Stored(r)) => Ok(Some(r.clone())),
            Some(VerdictSlot::Undecodable(detail)) => Err(ReadError::Decode(detail.clone())),
        })
    }

    async fn stake_position(&self, validator: Address) -> Result<StakePosition, ReadError> {
        self.read(|w| {
            Ok(StakePosition {
                validator,
                staked: w.stakes.get(&validator).copied().unwrap_or(0),
                minimum: w.minimum_stake,
            })
        })
    }

    async fn appeal_stake(&self) -> Result<u128, ReadError> {
        self.read(|w| Ok(w.appeal_stake))
    }

    async fn token_balance(&self, owner: Address) -> Result<u128, ReadError> {
        self.read(|w| Ok(w.balance(&owner)))
    }

    async fn token_allowance(&self, owner: Address, spender: Address) -> Result<u128, ReadError> {
        self.read(|w| Ok(w.allowance(owner, spender)))
    }

    async fn pool_balance(&self) -> Result<u128, ReadError> {
        self.read(|w| Ok(w.pool))
    }

    async fn registry_link(&self, from: RegistryKind, to: RegistryKind) -> Result<Option<Address>, ReadError> {
        self.read(|w| Ok(w.links.get(&(from, to)).copied()))
    }

    async fn simulate(&self, caller: Address, call: &LedgerCall) -> Result<SimulationOutcome, ReadError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.read_failure {
            return Err(ReadError::Network(reason.clone()));
        }
        inner.simulate_calls += 1;
        let mut scratch = inner.world.clone();
        Ok(match scratch.apply(caller, call) {
            Ok(()) => SimulationOutcome::WouldSucceed,
            Err(rejection) => SimulationOutcome::WouldRevert(rejection),
        })
    }
}

/// [`LedgerWriter`] bound to one identity of a [`MockLedger`].
#[derive(Clone)]
pub struct MockSigner {
    ledger: Arc<MockLedger>,
    signer: Address,
}

#[async_trait]
impl LedgerWriter for MockSigner {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn estimate_cost(&self, call: &LedgerCall) -> Result<u64, SubmitError> {
        self.ledger.estimate_as(self.signer, call)
    }

    async fn submit(&self, call: &LedgerCall, cost_ceiling: u64) -> Result<TxHash, SubmitError> {
        self.ledger.submit_as(self.signer, call, cost_ceiling)
    }

    async fn await_receipt(&self, tx: &TxHash) -> Result<Confirmation, SubmitError> {
        self.ledger
            .inner
            .lock()
            .receipts
            .get(tx)
            .cloned()
            .ok_or_else(|| SubmitError::Transport(format!("unknown transaction {tx}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CallArg;

    const ADMIN: Address = Address::new([0x0a; 20]);
    const REPORTER: Address = Address::new([0x0b; 20]);

    fn call(ledger: &MockLedger, target: RegistryKind, method: &'static str, args: Vec<CallArg>) -> LedgerCall {
        LedgerCall {
            target,
            to: ledger.deployment().address_of(target),
            method,
            args,
        }
    }

    #[tokio::test]
    async fn create_report_requires_registered_reporter() {
        let ledger = Arc::new(MockLedger::new());
        let inst = ledger.add_institution("Water Board", ADMIN, Address::repeat(0x0c));
        let c = call(
            &ledger,
            RegistryKind::ReportRegistry,
            methods::CREATE_REPORT,
            vec![CallArg::Uint(u128::from(inst)), CallArg::Text("Leak".into()), CallArg::Text("Main pipe".into())],
        );

        let w = ledger.signer(REPORTER);
        let err = w.submit(&c, 1_000_000).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected(r) if r.reason.contains("not a registered reporter")));

        ledger.add_reporter(inst, REPORTER);
        let tx = w.submit(&c, 1_000_000).await.unwrap();
        assert!(matches!(w.await_receipt(&tx).await.unwrap(), Confirmation::Confirmed { .. }));
        let r = ledger.report_snapshot(1).unwrap();
        assert_eq!(r.status, ReportStatus::Pending);
        assert_eq!(r.reporter, REPORTER);
    }

    #[tokio::test]
    async fn out_of_gas_below_method_cost() {
        let ledger = Arc::new(MockLedger::new());
        let c = call(
            &ledger,
            RegistryKind::Token,
            methods::APPROVE,
            vec![CallArg::Address(ADMIN), CallArg::Uint(5)],
        );
        let w = ledger.signer(REPORTER);
        assert!(w.submit(&c, 10).await.is_err());
        assert!(w.submit(&c, 46_000).await.is_ok());
    }

    #[tokio::test]
    async fn failure_queues_are_fifo() {
        let ledger = Arc::new(MockLedger::new());
        ledger.push_estimate_failure(SubmitError::Timeout);
        ledger.push_estimate_failure(SubmitError::Transport("reset".into()));
        let c = call(
            &ledger,
            RegistryKind::Token,
            methods::APPROVE,
            vec![CallArg::Address(ADMIN), CallArg::Uint(5)],
        );
        let w = ledger.signer(REPORTER);
        assert_eq!(w.estimate_cost(&c).await, Err(SubmitError::Timeout));
        assert!(matches!(w.estimate_cost(&c).await, Err(SubmitError::Transport(_))));
        assert_eq!(w.estimate_cost(&c).await, Ok(46_000));
        assert_eq!(ledger.estimate_calls(), 3);
    }

    #[tokio::test]
    async fn simulation_does_not_mutate() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(REPORTER, 100);
        let c = call(
            &ledger,
            RegistryKind::Token,
            methods::TRANSFER,
            vec![CallArg::Address(ADMIN), CallArg::Uint(60)],
        );
        assert_eq!(ledger.simulate(REPORTER, &c).await.unwrap(), SimulationOutcome::WouldSucceed);
        assert_eq!(ledger.balance_of(REPORTER), 100);
    }

    #[tokio::test]
    async fn reads_fail_when_injected() {
        let ledger = MockLedger::new();
        ledger.fail_reads("gateway down");
        assert!(matches!(ledger.institution_count().await, Err(ReadError::Network(_))));
        ledger.restore_reads();
        assert_eq!(ledger.institution_count().await, Ok(0));
    }

    #[tokio::test]
    async fn default_links_are_consistent() {
        let ledger = MockLedger::new();
        let d = ledger.deployment();
        for link in default_links() {
            assert_eq!(
                ledger.registry_link(link.from, link.to).await.unwrap(),
                Some(d.address_of(link.to))
            );
        }
        assert_eq!(
            ledger
                .registry_link(RegistryKind::Token, RegistryKind::ReportRegistry)
                .await
                .unwrap(),
            None
        );
    }
}
