use std::thread;

use anyhow::Result;
use ethereum_types::{Address, U256};
use hex_literal::hex;
use keccak_hash::keccak;
use main_sm_context::collaborators::{ContextObserver, HashDb, Rom, TraceSink};
use main_sm_context::ec::{EcAddInput, Secp256k1Adder};
use main_sm_context::fea::{u256_to_fec, Fec, F};
use main_sm_context::testing_utils::{init_logger, LabelledRom, MemoryTrace};
use main_sm_context::{ContextConfig, ContextError, ExecutionContext, HashSpace};
use num_bigint::BigInt;
use plonky2::field::types::Field;
use smt_trie::db::MemoryDb;
use smt_trie::keys::storage_key_inputs;
use smt_trie::smt::{HashOut, Key, SetMode, Smt, SmtError, SmtSetResult};

const DEGREE: usize = 16;
const COLUMNS: usize = 2;
const ROM_LEN: usize = 8;

fn empty_root() -> HashOut {
    HashOut {
        elements: [F::ZERO; 4],
    }
}

fn generator() -> Result<(Fec, Fec)> {
    let x = U256::from_big_endian(&hex!(
        "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
    ));
    let y = U256::from_big_endian(&hex!(
        "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8"
    ));
    Ok((u256_to_fec(x)?, u256_to_fec(y)?))
}

/// State backend counting the writes that reach it.
#[derive(Default)]
struct CountingDb {
    smt: Smt<MemoryDb>,
    sets: usize,
}

impl HashDb for CountingDb {
    fn set(&mut self, old_root: HashOut, key: Key, value: U256) -> Result<SmtSetResult, SmtError> {
        self.sets += 1;
        HashDb::set(&mut self.smt, old_root, key, value)
    }

    fn get(&mut self, root: HashOut, key: Key) -> Result<U256, SmtError> {
        HashDb::get(&mut self.smt, root, key)
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Vec<String>,
}

impl ContextObserver for RecordingObserver {
    fn on_hash_digest(&mut self, step: u64, space: HashSpace, id: u64, _digest: U256) {
        self.events.push(format!("{step}: hash{space} {id}"));
    }

    fn on_storage_write(&mut self, step: u64, res: &SmtSetResult, cached: bool) {
        self.events.push(format!("{step}: sstore {:?} cached={cached}", res.mode));
    }

    fn on_ec_add(&mut self, step: u64, cached: bool) {
        self.events.push(format!("{step}: ecadd cached={cached}"));
    }

    fn on_checkpoint(&mut self, step: u64, balanced: bool) {
        self.events.push(format!("{step}: checkpoint balanced={balanced}"));
    }
}

#[test]
fn hash_k_accumulates_piecewise_writes() -> Result<()> {
    init_logger();
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x");

    ctx.hash_write(HashSpace::K, 0, 0, b"ab")?;
    ctx.hash_write(HashSpace::K, 0, 2, b"cd")?;
    ctx.hash_finalize_length(HashSpace::K, 0, 4)?;

    let expected = U256::from_big_endian(keccak(b"abcd").as_bytes());
    assert_eq!(ctx.hash_digest(HashSpace::K, 0)?, expected);
    assert_eq!(ctx.hash_check_digest(HashSpace::K, 0, expected)?, expected);
    assert_eq!(ctx.hash_read(HashSpace::K, 0, 1, 2)?, b"bc".as_slice());
    assert_eq!(ctx.hash_k.entry(0).map(|e| e.reads.get(&1)), Some(Some(&2)));

    // Spaces are independent: the same id in P is untouched.
    assert!(ctx.hash_p.is_empty());
    assert!(matches!(
        ctx.hash_digest(HashSpace::P, 0),
        Err(ContextError::NotFinalized { .. })
    ));

    let wrong = expected ^ U256::one();
    assert!(matches!(
        ctx.hash_check_digest(HashSpace::K, 0, wrong),
        Err(ContextError::DigestMismatch { .. })
    ));

    Ok(())
}

#[test]
fn repeated_storage_write_hits_backend_once() -> Result<()> {
    init_logger();
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = CountingDb::default();
    let inputs = storage_key_inputs(Address::from_low_u64_be(0xcafe), U256::from(7));

    {
        let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x");
        ctx.set_position(3, 0, 1)?;
        let first = ctx.storage_write(&inputs, empty_root(), U256::from(42))?;
        assert_eq!(first.mode, SetMode::InsertNotFound);

        // Same step evaluated again.
        ctx.set_position(3, 1, 1)?;
        let second = ctx.storage_write(&inputs, empty_root(), U256::from(42))?;
        assert_eq!(first, second);
        assert_eq!(ctx.last_s_write.key_i[..], inputs.kin1[8..]);
        assert_eq!(ctx.last_s_write.new_root, first.new_root.elements);

        assert_eq!(ctx.storage_read(first.new_root, inputs.key)?, U256::from(42));
        assert_eq!(ctx.storage_read(empty_root(), inputs.key)?, U256::zero());

        // A later step misses the cache.
        ctx.set_position(4, 2, 1)?;
        ctx.storage_write(&inputs, empty_root(), U256::from(42))?;
    }

    assert_eq!(db.sets, 2);
    Ok(())
}

#[test]
fn cursors_are_validated_and_located() -> Result<()> {
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x");

    assert_eq!(ctx.domain_size(), DEGREE as u64);
    assert_eq!(
        ctx.set_position(DEGREE as u64, 0, 0),
        Err(ContextError::StepOutOfDomain {
            step: DEGREE as u64,
            domain_size: DEGREE as u64,
        })
    );
    assert_eq!(
        ctx.set_position(0, 0, ROM_LEN as u64),
        Err(ContextError::ProgramCounterOutOfRange {
            zkpc: ROM_LEN as u64,
            rom_len: ROM_LEN as u64,
        })
    );

    ctx.set_position(2, 5, 3)?;
    assert_eq!((ctx.step(), ctx.evaluation(), ctx.zkpc()), (2, 5, 3));
    ctx.trace_mut().set(2, 1, F::ONE);

    let failure = ctx.locate(ContextError::NotFilled);
    assert_eq!(failure.location.as_deref(), Some("main.zkasm:4"));
    assert_eq!(
        failure.to_string(),
        "step 2 (zkPC 3 at main.zkasm:4): ECRecover precalc buffer read before being filled"
    );

    ctx.set_last_step(9);
    ctx.reset_run();
    assert_eq!((ctx.step(), ctx.zkpc(), ctx.last_step()), (0, 0, 0));
    drop(ctx);

    assert_eq!(trace.get(2, 1), F::ONE);
    Ok(())
}

#[test]
fn observer_sees_context_events() -> Result<()> {
    init_logger();
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let mut observer = RecordingObserver::default();
    let inputs = storage_key_inputs(Address::from_low_u64_be(1), U256::one());
    let (gx, gy) = generator()?;
    let double = EcAddInput {
        x1: gx,
        y1: gy,
        x2: gx,
        y2: gy,
        double: true,
    };

    {
        let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x")
            .with_observer(&mut observer);
        ctx.set_position(1, 0, 0)?;
        ctx.hash_finalize_length(HashSpace::P, 5, 0)?;
        let empty = ctx.hash_digest(HashSpace::P, 5)?;
        // Digests first taken through a check are reported too.
        ctx.hash_finalize_length(HashSpace::P, 6, 0)?;
        ctx.hash_check_digest(HashSpace::P, 6, empty)?;

        ctx.set_position(2, 1, 1)?;
        ctx.storage_write(&inputs, empty_root(), U256::from(3))?;
        ctx.storage_write(&inputs, empty_root(), U256::from(3))?;

        ctx.set_position(3, 2, 2)?;
        let first = ctx.ec_add(&Secp256k1Adder, double)?;
        let second = ctx.ec_add(&Secp256k1Adder, double)?;
        assert_eq!(first, second);

        ctx.total_transferred_balance.record_transfer(&BigInt::from(-5));
        ctx.set_position(4, 3, 3)?;
        assert!(ctx.checkpoint().is_err());
    }

    assert_eq!(
        observer.events,
        vec![
            "1: hashP 5",
            "1: hashP 6",
            "2: sstore InsertNotFound cached=false",
            "2: sstore InsertNotFound cached=true",
            "3: ecadd cached=false",
            "3: ecadd cached=true",
            "4: checkpoint balanced=false",
        ]
    );
    Ok(())
}

#[test]
fn balance_checkpoint() -> Result<()> {
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x");

    // A transfer is a debit followed by a credit.
    let amount = BigInt::from(1_000_000_007u64);
    ctx.total_transferred_balance.record_transfer(&-amount.clone());
    assert_eq!(
        ctx.checkpoint(),
        Err(ContextError::BalanceConservationViolation {
            residual: -amount.clone(),
        })
    );
    ctx.total_transferred_balance.record_transfer(&amount);
    ctx.checkpoint()?;
    Ok(())
}

#[test]
fn reset_run_clears_components() -> Result<()> {
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let mut ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, "0x");
    let inputs = storage_key_inputs(Address::zero(), U256::zero());

    ctx.hash_write(HashSpace::K, 1, 0, &[1, 2, 3])?;
    ctx.hash_write(HashSpace::P, 1, 0, &[4])?;
    ctx.mem.write(10, U256::from(99).into());
    ctx.vars.declare("txCount")?;
    ctx.accessed_storage.push_context();
    ctx.accessed_storage.mark_accessed(U256::one(), U256::one())?;
    ctx.storage_write(&inputs, empty_root(), U256::one())?;
    ctx.ecrecover_precalc.append(Fec::ONE)?;
    ctx.ecrecover_precalc.mark_filled();
    ctx.total_transferred_balance.record_transfer(&BigInt::from(1));

    ctx.reset_run();

    assert!(ctx.hash_k.is_empty());
    assert!(ctx.hash_p.is_empty());
    assert!(ctx.mem.is_empty());
    assert_eq!(ctx.mem.read(10).to_u256()?, U256::zero());
    ctx.vars.declare("txCount")?;
    assert_eq!(ctx.accessed_storage.depth(), 0);
    assert!(ctx.last_s_write.try_reuse(0, &inputs).is_none());
    assert!(!ctx.ecrecover_precalc.is_filled());
    assert!(ctx.total_transferred_balance.check_zero());
    Ok(())
}

#[test]
fn precalc_follows_config() -> Result<()> {
    let config = ContextConfig::from_json(r#"{ "ecrecover_precalc": false }"#)?;
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);
    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
    let mut db = Smt::<MemoryDb>::default();
    let request = vec![0u8; 32];
    let ctx = ExecutionContext::new(&config, &rom, &mut trace, &mut db, &request);

    assert!(!ctx.precalc_enabled());
    assert_eq!(ctx.config().precalc_threads(), 16);
    assert_eq!(ctx.request().len(), 32);
    assert_eq!(ctx.rom().location(0).as_deref(), Some("main.zkasm:1"));
    Ok(())
}

#[test]
fn parallel_runs_do_not_interfere() -> Result<()> {
    init_logger();
    let config = ContextConfig::default();
    let rom = LabelledRom::new("main.zkasm", ROM_LEN);

    let roots = thread::scope(|s| {
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let (config, rom) = (&config, &rom);
                s.spawn(move || -> Result<(U256, HashOut)> {
                    let mut trace = MemoryTrace::new(DEGREE, COLUMNS);
                    let mut db = Smt::<MemoryDb>::default();
                    let mut ctx = ExecutionContext::new(config, rom, &mut trace, &mut db, &i);
                    ctx.hash_write(HashSpace::K, 0, 0, b"abcd")?;
                    ctx.hash_finalize_length(HashSpace::K, 0, 4)?;
                    let digest = ctx.hash_digest(HashSpace::K, 0)?;
                    let inputs =
                        storage_key_inputs(Address::from_low_u64_be(0xcafe), U256::from(7));
                    let res = ctx.storage_write(&inputs, empty_root(), U256::from(42))?;
                    Ok((digest, res.new_root))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("context thread panicked"))
            .collect::<Result<Vec<_>>>()
    })?;

    assert_eq!(roots.len(), 4);
    assert!(roots.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}
