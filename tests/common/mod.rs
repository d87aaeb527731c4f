//! Shared fakes for integration testing.
//!
//! `FakeSource` models a source node's best chain plus every header it has
//! ever seen. `FakeLedger` models the registry contract closely enough for
//! the pipeline: it answers the view calls, runs preflights, and applies
//! submitted headers and tip moves to its own state.

#![allow(dead_code)]

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use relay_maintainer::bitcoin::{Digest, Header, SourceChain, SourceError, SourceResult, SourceTransaction};
use relay_maintainer::blockchain::abi::IRelay;
use relay_maintainer::blockchain::{
    BlockchainConfig, BlockchainError, BlockchainResult, ConsensusClient, Credentials, Ledger, TxDispatcher,
};
use relay_maintainer::config::PipelineConfig;
use relay_maintainer::lifecycle::Shutdown;
use relay_maintainer::relay::RelayContext;

pub const CONTRACT: Address = Address::repeat_byte(0xaa);
pub const OPERATOR: Address = Address::repeat_byte(0xbb);

// ---------------------------------------------------------------------------
// Header builders
// ---------------------------------------------------------------------------

/// A header at `height` whose parent is `prev`. `seed` distinguishes forks.
pub fn header_at(height: u64, prev: Digest, seed: u8) -> Header {
    let mut raw = [0u8; 80];
    raw[0] = 1;
    raw[4..36].copy_from_slice(&prev.0);
    raw[36] = seed;
    raw[68..76].copy_from_slice(&height.to_le_bytes());
    raw[76] = seed;
    Header::from_raw(&raw, height).unwrap()
}

/// `len` linked headers starting at `start`; the first has a zero parent.
pub fn chain(start: u64, len: usize, seed: u8) -> Vec<Header> {
    let mut out: Vec<Header> = Vec::with_capacity(len);
    for i in 0..len as u64 {
        let prev = out.last().map(|h| h.hash).unwrap_or(Digest::ZERO);
        out.push(header_at(start + i, prev, seed));
    }
    out
}

/// `len` headers extending `parent`.
pub fn extend(parent: &Header, len: usize, seed: u8) -> Vec<Header> {
    let mut out: Vec<Header> = Vec::with_capacity(len);
    for i in 1..=len as u64 {
        let prev = out.last().map(|h| h.hash).unwrap_or(parent.hash);
        out.push(header_at(parent.height + i, prev, seed));
    }
    out
}

pub fn heights(headers: &[Header]) -> Vec<u64> {
    headers.iter().map(|h| h.height).collect()
}

// ---------------------------------------------------------------------------
// FakeSource
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    best: BTreeMap<u64, Header>,
    by_hash: HashMap<Digest, Header>,
    failures: u32,
    repeat_next: u32,
    height_requests: Vec<u64>,
}

#[derive(Default)]
pub struct FakeSource {
    state: Mutex<SourceState>,
    closed: AtomicBool,
}

impl FakeSource {
    pub fn new(headers: &[Header]) -> Arc<Self> {
        let source = Arc::new(Self::default());
        source.extend(headers);
        source
    }

    /// Append headers to the best chain.
    pub fn extend(&self, headers: &[Header]) {
        let mut state = self.state.lock().unwrap();
        for h in headers {
            state.best.insert(h.height, h.clone());
            state.by_hash.insert(h.hash, h.clone());
        }
    }

    /// Make headers known by hash without putting them on the best chain.
    pub fn remember(&self, headers: &[Header]) {
        let mut state = self.state.lock().unwrap();
        for h in headers {
            state.by_hash.insert(h.hash, h.clone());
        }
    }

    /// Replace the best chain from the first header's height upward.
    /// Displaced headers stay known by hash.
    pub fn reorg(&self, headers: &[Header]) {
        {
            let mut state = self.state.lock().unwrap();
            let _ = state.best.split_off(&headers[0].height);
        }
        self.extend(headers);
    }

    /// Fail the next `n` height lookups with a decode error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().unwrap().failures = n;
    }

    /// Answer the next `n` height lookups with the previous height's header.
    pub fn repeat_next(&self, n: u32) {
        self.state.lock().unwrap().repeat_next = n;
    }

    pub fn height_requests(&self) -> Vec<u64> {
        self.state.lock().unwrap().height_requests.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceChain for FakeSource {
    async fn header_by_hash(&self, digest: &Digest) -> SourceResult<Option<Header>> {
        Ok(self.state.lock().unwrap().by_hash.get(digest).cloned())
    }

    async fn header_by_height(&self, height: u64) -> SourceResult<Option<Header>> {
        let mut state = self.state.lock().unwrap();
        state.height_requests.push(height);
        if state.failures > 0 {
            state.failures -= 1;
            return Err(SourceError::Decode("injected failure".to_string()));
        }
        if state.repeat_next > 0 && height > 0 {
            state.repeat_next -= 1;
            return Ok(state.best.get(&(height - 1)).cloned());
        }
        Ok(state.best.get(&height).cloned())
    }

    async fn chain_tips(&self) -> SourceResult<Vec<Digest>> {
        let state = self.state.lock().unwrap();
        Ok(state.best.values().last().map(|h| h.hash).into_iter().collect())
    }

    async fn transaction(&self, _txid: &Digest) -> SourceResult<Option<SourceTransaction>> {
        Ok(None)
    }

    async fn close(&self) -> SourceResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeLedger
// ---------------------------------------------------------------------------

/// A transaction the ledger accepted.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub nonce: u64,
    pub input: Bytes,
    pub signed_locally: bool,
}

impl SentTx {
    pub fn method(&self) -> &'static str {
        method_name(&self.input)
    }
}

fn method_name(input: &[u8]) -> &'static str {
    let selector: [u8; 4] = match input.get(..4).and_then(|s| s.try_into().ok()) {
        Some(s) => s,
        None => return "unknown",
    };
    if selector == IRelay::addHeadersCall::SELECTOR {
        "addHeaders"
    } else if selector == IRelay::addHeadersWithRetargetCall::SELECTOR {
        "addHeadersWithRetarget"
    } else if selector == IRelay::markNewHeaviestCall::SELECTOR {
        "markNewHeaviest"
    } else if selector == IRelay::getBestKnownDigestCall::SELECTOR {
        "getBestKnownDigest"
    } else if selector == IRelay::findHeightCall::SELECTOR {
        "findHeight"
    } else if selector == IRelay::isAncestorCall::SELECTOR {
        "isAncestor"
    } else {
        "unknown"
    }
}

pub struct LedgerState {
    pub best: Digest,
    pub heights: HashMap<Digest, u64>,
    pub parents: HashMap<Digest, Digest>,
    pub nonce: u64,
    pub preflight: VecDeque<bool>,
    pub preflights: usize,
    pub receipt: Option<bool>,
    pub fail_broadcast: bool,
    pub sent: Vec<SentTx>,
    pub unlocks: usize,
    pub malformed_best: bool,
    pub closed: bool,
    pub fail_close: bool,
}

pub struct FakeLedger {
    pub state: Mutex<LedgerState>,
}

fn word(value: U256) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes::<32>())
}

fn bool_word(value: bool) -> Bytes {
    word(U256::from(value as u8))
}

impl FakeLedger {
    /// A registry whose best tip is `best` and which knows `known`.
    pub fn new(best: &Header, known: &[Header]) -> Arc<Self> {
        let ledger = Arc::new(Self {
            state: Mutex::new(LedgerState {
                best: best.hash,
                heights: HashMap::new(),
                parents: HashMap::new(),
                nonce: 7,
                preflight: VecDeque::new(),
                preflights: 0,
                receipt: Some(true),
                fail_broadcast: false,
                sent: Vec::new(),
                unlocks: 0,
                malformed_best: false,
                closed: false,
                fail_close: false,
            }),
        });
        ledger.know(known);
        ledger.know(std::slice::from_ref(best));
        ledger
    }

    pub fn know(&self, headers: &[Header]) {
        let mut state = self.state.lock().unwrap();
        for h in headers {
            state.heights.insert(h.hash, h.height);
            state.parents.insert(h.hash, h.prevhash);
        }
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_methods(&self) -> Vec<&'static str> {
        self.sent().iter().map(SentTx::method).collect()
    }

    pub fn best(&self) -> Digest {
        self.state.lock().unwrap().best
    }

    pub fn set_best(&self, digest: Digest) {
        self.state.lock().unwrap().best = digest;
    }

    fn is_ancestor(state: &LedgerState, ancestor: Digest, descendant: Digest, limit: u64) -> bool {
        let mut cursor = descendant;
        for _ in 0..=limit {
            if cursor == ancestor {
                return true;
            }
            match state.parents.get(&cursor) {
                Some(parent) => cursor = *parent,
                None => return false,
            }
        }
        false
    }

    fn record_headers(state: &mut LedgerState, parent: Digest, headers: &[u8]) {
        let mut height = state.heights.get(&parent).copied().unwrap_or(0);
        let mut prev = parent;
        for chunk in headers.chunks(80) {
            let header = Header::from_raw(chunk, 0).unwrap();
            height += 1;
            state.heights.insert(header.hash, height);
            state.parents.insert(header.hash, prev);
            prev = header.hash;
        }
    }

    fn apply(state: &mut LedgerState, input: &[u8]) {
        if let Ok(call) = IRelay::addHeadersCall::abi_decode(input) {
            let anchor = Header::from_raw(&call.anchor, 0).unwrap();
            Self::record_headers(state, anchor.hash, &call.headers);
        } else if let Ok(call) = IRelay::addHeadersWithRetargetCall::abi_decode(input) {
            let first = Header::from_raw(&call.headers, 0).unwrap();
            Self::record_headers(state, first.prevhash, &call.headers);
        } else if let Ok(call) = IRelay::markNewHeaviestCall::abi_decode(input) {
            state.best = Header::from_raw(&call.newBest, 0).unwrap().hash;
        }
    }

    fn accept(&self, nonce: u64, input: Bytes, signed_locally: bool) -> BlockchainResult<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.fail_broadcast {
            return Err(BlockchainError::Rpc("broadcast rejected".to_string()));
        }
        Self::apply(&mut state, &input);
        let mut preimage = nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(&input);
        state.sent.push(SentTx {
            nonce,
            input,
            signed_locally,
        });
        Ok(keccak256(preimage))
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        let input = tx.input.input().cloned().unwrap_or_default();
        let mut state = self.state.lock().unwrap();

        match method_name(&input) {
            "getBestKnownDigest" if state.malformed_best => Ok(Bytes::new()),
            "getBestKnownDigest" => Ok(Bytes::copy_from_slice(state.best.as_registry_word().as_slice())),
            "findHeight" => {
                let call = IRelay::findHeightCall::abi_decode(&input).unwrap();
                let digest = Digest::from_registry_word(call.digest);
                Ok(word(U256::from(state.heights.get(&digest).copied().unwrap_or(0))))
            }
            "isAncestor" => {
                let call = IRelay::isAncestorCall::abi_decode(&input).unwrap();
                let limit: u64 = call.limit.try_into().unwrap();
                Ok(bool_word(Self::is_ancestor(
                    &state,
                    Digest::from_registry_word(call.ancestor),
                    Digest::from_registry_word(call.descendant),
                    limit,
                )))
            }
            "markNewHeaviest" => {
                state.preflights += 1;
                Ok(bool_word(state.preflight.pop_front().unwrap_or(true)))
            }
            _ => Ok(bool_word(true)),
        }
    }

    async fn transaction_count(&self, _address: Address) -> BlockchainResult<u64> {
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn send_raw_transaction(&self, encoded: Bytes) -> BlockchainResult<TxHash> {
        let envelope = TxEnvelope::decode_2718(&mut encoded.as_ref())
            .map_err(|e| BlockchainError::Decode(e.to_string()))?;
        self.accept(envelope.nonce(), envelope.input().clone(), true)
    }

    async fn unlock_account(&self, _address: Address, _unlock_code: &str) -> BlockchainResult<()> {
        self.state.lock().unwrap().unlocks += 1;
        Ok(())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> BlockchainResult<TxHash> {
        let nonce = tx.nonce.unwrap_or_default();
        let input = tx.input.input().cloned().unwrap_or_default();
        self.accept(nonce, input, false)
    }

    async fn receipt_status(&self, _tx_hash: TxHash) -> BlockchainResult<Option<bool>> {
        Ok(self.state.lock().unwrap().receipt)
    }

    async fn close(&self) -> BlockchainResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_close {
            return Err(BlockchainError::Rpc("close failed".to_string()));
        }
        state.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub fn remote_credentials() -> Credentials {
    Credentials::Remote {
        address: OPERATOR,
        unlock_code: "hunter2".to_string(),
    }
}

/// A pipeline context over the fakes, signing through the ledger node.
pub async fn context(source: Arc<FakeSource>, ledger: Arc<FakeLedger>, shutdown: Shutdown) -> RelayContext {
    context_with(source, ledger, shutdown, remote_credentials()).await
}

pub async fn context_with(
    source: Arc<FakeSource>,
    ledger: Arc<FakeLedger>,
    shutdown: Shutdown,
    credentials: Credentials,
) -> RelayContext {
    let ledger: Arc<dyn Ledger> = ledger;
    let config = BlockchainConfig::default();
    let registry = ConsensusClient::new(ledger.clone(), CONTRACT, credentials.address(), 240);
    let dispatcher = TxDispatcher::new(ledger, credentials, &config, CONTRACT, shutdown)
        .await
        .unwrap();

    RelayContext {
        source,
        registry,
        dispatcher,
        pipeline: PipelineConfig::default(),
    }
}

/// Let spawned tasks run until they are all parked on timers or channels.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
