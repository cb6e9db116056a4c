use ethereum_types::U256;
use log::{debug, trace};
use smt_trie::keys::KeyInputs;
use smt_trie::smt::{HashOut, Key, SmtSetResult};

use crate::access::StorageAccessTracker;
use crate::balance::BalanceAccumulator;
use crate::collaborators::{ContextObserver, HashDb, Rom, TraceSink};
use crate::config::ContextConfig;
use crate::ec::{CurveAdder, EcAddCache, EcAddInput, EcRecoverPrecalcBuffer};
use crate::errors::{ContextError, ContextResult, StepFailure};
use crate::fea::Fec;
use crate::hash::{ByteDigest, HashAccumulator, HashSpace, KeccakDigest, PoseidonDigest};
use crate::memory::{Memory, Vars};
use crate::storage_cache::LastSWrite;

/// Everything the main state machine keeps between steps of one execution
/// run.
///
/// The context owns its caches and accumulators, and borrows the program,
/// the trace, the state backend and the input request from the interpreter
/// that drives it. The interpreter positions the context on a step with
/// [`ExecutionContext::set_position`] before evaluating it; the context never
/// moves its cursors by itself. Independent runs use independent contexts,
/// which share nothing mutable.
pub struct ExecutionContext<'a, R, T, B, I: ?Sized, K = KeccakDigest, P = PoseidonDigest> {
    config: &'a ContextConfig,
    rom: &'a R,
    trace: &'a mut T,
    hash_db: &'a mut B,
    request: &'a I,
    observer: Option<&'a mut dyn ContextObserver>,

    /// Last state tree write.
    pub last_s_write: LastSWrite,
    /// Last curve addition.
    pub last_ec_add: EcAddCache,
    pub ecrecover_precalc: EcRecoverPrecalcBuffer,
    /// Sum of all transferred balances, zero after any complete transfer.
    pub total_transferred_balance: BalanceAccumulator,
    pub hash_k: HashAccumulator<K>,
    pub hash_p: HashAccumulator<P>,
    pub vars: Vars,
    pub mem: Memory,
    /// Storage slots accessed, one frame per call context.
    pub accessed_storage: StorageAccessTracker,

    step: u64,
    evaluation: u64,
    zkpc: u64,
    last_step: u64,
}

impl<'a, R, T, B, I> ExecutionContext<'a, R, T, B, I>
where
    R: Rom,
    T: TraceSink,
    B: HashDb,
    I: ?Sized,
{
    /// A context hashing `K` with Keccak-256 and `P` with Poseidon.
    pub fn new(
        config: &'a ContextConfig,
        rom: &'a R,
        trace: &'a mut T,
        hash_db: &'a mut B,
        request: &'a I,
    ) -> Self {
        Self::with_hashers(
            config,
            rom,
            trace,
            hash_db,
            request,
            KeccakDigest,
            PoseidonDigest,
        )
    }
}

impl<'a, R, T, B, I, K, P> ExecutionContext<'a, R, T, B, I, K, P>
where
    R: Rom,
    T: TraceSink,
    B: HashDb,
    I: ?Sized,
    K: ByteDigest,
    P: ByteDigest,
{
    pub fn with_hashers(
        config: &'a ContextConfig,
        rom: &'a R,
        trace: &'a mut T,
        hash_db: &'a mut B,
        request: &'a I,
        hasher_k: K,
        hasher_p: P,
    ) -> Self {
        Self {
            config,
            rom,
            trace,
            hash_db,
            request,
            observer: None,
            last_s_write: LastSWrite::default(),
            last_ec_add: EcAddCache::default(),
            ecrecover_precalc: EcRecoverPrecalcBuffer::default(),
            total_transferred_balance: BalanceAccumulator::default(),
            hash_k: HashAccumulator::new(HashSpace::K, hasher_k),
            hash_p: HashAccumulator::new(HashSpace::P, hasher_p),
            vars: Vars::default(),
            mem: Memory::default(),
            accessed_storage: StorageAccessTracker::default(),
            step: 0,
            evaluation: 0,
            zkpc: 0,
            last_step: 0,
        }
    }

    pub fn with_observer(mut self, observer: &'a mut dyn ContextObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        self.config
    }

    pub fn rom(&self) -> &R {
        self.rom
    }

    pub fn request(&self) -> &I {
        self.request
    }

    pub fn trace_mut(&mut self) -> &mut T {
        &mut *self.trace
    }

    pub fn precalc_enabled(&self) -> bool {
        self.config.ecrecover_precalc
    }

    /// Size of the evaluation domain, i.e. the number of trace rows.
    pub fn domain_size(&self) -> u64 {
        self.trace.degree() as u64
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn evaluation(&self) -> u64 {
        self.evaluation
    }

    pub fn zkpc(&self) -> u64 {
        self.zkpc
    }

    pub fn last_step(&self) -> u64 {
        self.last_step
    }

    /// Positions the context on the trace row `step`, for the `evaluation`-th
    /// evaluation of the instruction at `zkpc`.
    pub fn set_position(&mut self, step: u64, evaluation: u64, zkpc: u64) -> ContextResult<()> {
        let domain_size = self.domain_size();
        if step >= domain_size {
            return Err(ContextError::StepOutOfDomain { step, domain_size });
        }
        let rom_len = self.rom.len() as u64;
        if zkpc >= rom_len {
            return Err(ContextError::ProgramCounterOutOfRange { zkpc, rom_len });
        }
        self.step = step;
        self.evaluation = evaluation;
        self.zkpc = zkpc;
        Ok(())
    }

    /// Records the step at which the run stopped.
    pub fn set_last_step(&mut self, step: u64) {
        self.last_step = step;
    }

    /// Drops all per-run state, leaving the context as freshly built.
    pub fn reset_run(&mut self) {
        debug!(
            "Resetting execution context ({} hashK, {} hashP, {} memory cells)",
            self.hash_k.len(),
            self.hash_p.len(),
            self.mem.len()
        );
        self.last_s_write.reset();
        self.last_ec_add.reset();
        self.ecrecover_precalc.reset();
        self.total_transferred_balance.reset();
        self.hash_k.clear();
        self.hash_p.clear();
        self.vars.clear();
        self.mem.clear();
        self.accessed_storage.clear();
        self.step = 0;
        self.evaluation = 0;
        self.zkpc = 0;
        self.last_step = 0;
    }

    /// Attaches the current position to an error, to report it out of the
    /// run.
    pub fn locate(&self, source: ContextError) -> StepFailure {
        StepFailure {
            step: self.step,
            zkpc: self.zkpc,
            location: self.rom.location(self.zkpc),
            source,
        }
    }

    pub fn hash_write(
        &mut self,
        space: HashSpace,
        id: u64,
        offset: u64,
        bytes: &[u8],
    ) -> ContextResult<()> {
        match space {
            HashSpace::K => self.hash_k.write(id, offset, bytes),
            HashSpace::P => self.hash_p.write(id, offset, bytes),
        }
    }

    pub fn hash_finalize_length(
        &mut self,
        space: HashSpace,
        id: u64,
        len: u64,
    ) -> ContextResult<()> {
        match space {
            HashSpace::K => self.hash_k.finalize_length(id, len),
            HashSpace::P => self.hash_p.finalize_length(id, len),
        }
    }

    pub fn hash_digest(&mut self, space: HashSpace, id: u64) -> ContextResult<U256> {
        let digest = match space {
            HashSpace::K => self.hash_k.digest(id)?,
            HashSpace::P => self.hash_p.digest(id)?,
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.on_hash_digest(self.step, space, id, digest);
        }
        Ok(digest)
    }

    /// Compares the digest of hash `id` with the one the program claims.
    pub fn hash_check_digest(
        &mut self,
        space: HashSpace,
        id: u64,
        claimed: U256,
    ) -> ContextResult<U256> {
        self.hash_digest(space, id)?;
        match space {
            HashSpace::K => self.hash_k.check_digest(id, claimed),
            HashSpace::P => self.hash_p.check_digest(id, claimed),
        }
    }

    pub fn hash_read(
        &mut self,
        space: HashSpace,
        id: u64,
        offset: u64,
        len: u64,
    ) -> ContextResult<&[u8]> {
        match space {
            HashSpace::K => self.hash_k.read(id, offset, len),
            HashSpace::P => self.hash_p.read(id, offset, len),
        }
    }

    /// Sets `inputs.key` to `value` on top of `old_root`.
    ///
    /// A write repeated at the same step for the same key preimages is served
    /// from [`LastSWrite`] without calling
    /// the backend again.
    pub fn storage_write(
        &mut self,
        inputs: &KeyInputs,
        old_root: HashOut,
        value: U256,
    ) -> ContextResult<SmtSetResult> {
        let step = self.step;
        let (res, cached) = match self.last_s_write.try_reuse(step, inputs).cloned() {
            Some(res) => {
                trace!("Storage write at step {step} served from cache");
                (res, true)
            }
            None => {
                let res = self.hash_db.set(old_root, inputs.key, value)?;
                self.last_s_write.store(step, inputs, res.clone());
                (res, false)
            }
        };
        if let Some(observer) = self.observer.as_mut() {
            observer.on_storage_write(step, &res, cached);
        }
        Ok(res)
    }

    pub fn storage_read(&mut self, root: HashOut, key: Key) -> ContextResult<U256> {
        Ok(self.hash_db.get(root, key)?)
    }

    /// Adds two curve points, or doubles the first, reusing the previous
    /// result when the operands are identical.
    pub fn ec_add<A: CurveAdder>(
        &mut self,
        adder: &A,
        input: EcAddInput,
    ) -> ContextResult<(Fec, Fec)> {
        let (point, cached) = self.last_ec_add.get_or_add(adder, input)?;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_ec_add(self.step, cached);
        }
        Ok(point)
    }

    /// Conservation checkpoint: transferred balances must net to zero.
    pub fn checkpoint(&mut self) -> ContextResult<()> {
        let balanced = self.total_transferred_balance.check_zero();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_checkpoint(self.step, balanced);
        }
        self.total_transferred_balance.checkpoint()
    }
}
