//! # IBC Genesis Migration
//!
//! Upgrades the `ibc` module state to the IBC 1.0 layout. This transform
//! always runs after the labelled app-state transform and after metadata
//! overrides, because two of its outputs depend on the final document
//! metadata:
//!
//! - expiry of Tendermint consensus states is judged against `genesis_time`
//! - processed-height metadata embeds the chain's own height
//!   `{revision(chain_id)}-{initial_height}`
//!
//! ## Steps
//!
//! 1. `connection_genesis.params.max_expected_time_per_block` is set.
//! 2. Solo machine v1 clients become v2 clients. `frozen_sequence` turns
//!    into `is_frozen`, and their separate consensus states are dropped
//!    because v2 keeps the consensus state inside the client state.
//! 3. Tendermint consensus states with `timestamp + trusting_period <=
//!    genesis_time` are pruned. A client left with no consensus states
//!    loses its `clients_consensus` entry. Every Tendermint client in
//!    `clients` must have one in the export.
//! 4. Tendermint client metadata is rebuilt from the surviving heights.
//!    A height that carried `processedTime` gets `processedHeight`, then
//!    `processedTime`, then its iteration key; a height without it gets
//!    nothing. A client whose rebuilt metadata is empty is dropped.
//!
//! Clients of any other type, and every other field of the module, pass
//! through unchanged. Without an `ibc` module the transform is a no-op.

use std::collections::{BTreeMap, BTreeSet};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::Duration;
use serde_json::{json, Map, Value};

use genmig_core::{AppStateMap, GenesisError, GenesisTime};

use crate::config::IbcPolicy;
use crate::registry::{MigrationContext, MigrationTransform};

/// Module name of the IBC core state.
pub const IBC_MODULE: &str = "ibc";

const TENDERMINT_CLIENT_STATE: &str = "/ibc.lightclients.tendermint.v1.ClientState";
const SOLOMACHINE_V1_CLIENT_STATE: &str = "/ibc.lightclients.solomachine.v1.ClientState";
const SOLOMACHINE_V2_CLIENT_STATE: &str = "/ibc.lightclients.solomachine.v2.ClientState";
const SOLOMACHINE_V1_CONSENSUS_STATE: &str = "/ibc.lightclients.solomachine.v1.ConsensusState";
const SOLOMACHINE_V2_CONSENSUS_STATE: &str = "/ibc.lightclients.solomachine.v2.ConsensusState";

const ITERATE_CONSENSUS_STATES: &[u8] = b"iterateConsensusStates";

/// The IBC 1.0 genesis transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct IbcMigration {
    policy: IbcPolicy,
}

impl IbcMigration {
    /// Build the transform with the given policy.
    pub fn new(policy: IbcPolicy) -> Self {
        Self { policy }
    }
}

impl MigrationTransform for IbcMigration {
    fn migrate(
        &self,
        mut state: AppStateMap,
        ctx: &MigrationContext,
    ) -> Result<AppStateMap, GenesisError> {
        let Some(mut ibc) = state.remove(IBC_MODULE) else {
            tracing::debug!("no ibc module; skipping ibc migration");
            return Ok(state);
        };

        let module = object_mut(&mut ibc, "app_state.ibc")?;
        if let Some(client_genesis) = module.get_mut("client_genesis") {
            migrate_client_genesis(client_genesis, ctx)?;
        }
        set_max_expected_time_per_block(module, self.policy.max_expected_time_per_block)?;

        state.insert(IBC_MODULE, ibc);
        Ok(state)
    }
}

fn set_max_expected_time_per_block(
    module: &mut Map<String, Value>,
    nanos: u64,
) -> Result<(), GenesisError> {
    let connection = module
        .entry("connection_genesis")
        .or_insert_with(|| json!({}));
    let connection = object_mut(connection, "app_state.ibc.connection_genesis")?;
    let params = connection.entry("params").or_insert_with(|| json!({}));
    let params = object_mut(params, "app_state.ibc.connection_genesis.params")?;
    params.insert(
        "max_expected_time_per_block".into(),
        Value::String(nanos.to_string()),
    );
    Ok(())
}

fn migrate_client_genesis(genesis: &mut Value, ctx: &MigrationContext) -> Result<(), GenesisError> {
    const PATH: &str = "app_state.ibc.client_genesis";
    let genesis = object_mut(genesis, PATH)?;

    let mut solo_machines = BTreeSet::new();
    let mut trusting_periods = BTreeMap::new();

    if let Some(clients) = genesis.get_mut("clients") {
        for (i, client) in array_mut(clients, &format!("{PATH}.clients"))?.iter_mut().enumerate() {
            let path = format!("{PATH}.clients[{i}]");
            let client = object_mut(client, &path)?;
            let client_id = str_field(client, "client_id", &path)?.to_string();
            let Some(client_state) = client.get_mut("client_state") else {
                continue;
            };
            let state_path = format!("{path}.client_state");
            let client_state = object_mut(client_state, &state_path)?;
            match client_state.get("@type").and_then(Value::as_str) {
                Some(SOLOMACHINE_V1_CLIENT_STATE) => {
                    upgrade_solo_machine(client_state, &state_path)?;
                    solo_machines.insert(client_id);
                }
                Some(TENDERMINT_CLIENT_STATE) => {
                    let raw = str_field(client_state, "trusting_period", &state_path)?;
                    let period = parse_proto_duration(raw).ok_or_else(|| {
                        GenesisError::malformed_at(
                            &format!("{state_path}.trusting_period"),
                            format!("invalid duration {raw:?}"),
                        )
                    })?;
                    trusting_periods.insert(client_id, period);
                }
                _ => {}
            }
        }
    }

    let self_height = format!(
        "{}-{}",
        ctx.chain_id.revision_number(),
        ctx.initial_height
    );
    let mut consensus_heights: BTreeMap<String, ConsensusHeights> = BTreeMap::new();

    if let Some(clients_consensus) = genesis.get_mut("clients_consensus") {
        let path = format!("{PATH}.clients_consensus");
        let entries = array_mut(clients_consensus, &path)?;
        let mut retained = Vec::with_capacity(entries.len());
        for (i, mut entry) in std::mem::take(entries).into_iter().enumerate() {
            let entry_path = format!("{path}[{i}]");
            let obj = object_mut(&mut entry, &entry_path)?;
            let client_id = str_field(obj, "client_id", &entry_path)?.to_string();
            if solo_machines.contains(&client_id) {
                tracing::debug!(%client_id, "dropped solo machine consensus states");
                continue;
            }
            if let Some(period) = trusting_periods.get(&client_id) {
                let heights = prune_expired(obj, *period, &ctx.genesis_time, &entry_path)?;
                let emptied = heights.retained.is_empty();
                consensus_heights.insert(client_id.clone(), heights);
                if emptied {
                    tracing::debug!(%client_id, "dropped client with no unexpired consensus states");
                    continue;
                }
            }
            retained.push(entry);
        }
        *entries = retained;
    }

    if let Some(missing) = trusting_periods
        .keys()
        .find(|id| !consensus_heights.contains_key(*id))
    {
        return Err(GenesisError::malformed_at(
            &format!("{PATH}.clients_consensus"),
            format!("consensus states for client {missing} not found"),
        ));
    }

    if let Some(metadata) = genesis.get_mut("clients_metadata") {
        rewrite_metadata(metadata, &consensus_heights, &solo_machines, &self_height)?;
    }

    for (client_id, heights) in &consensus_heights {
        tracing::info!(
            %client_id,
            pruned = heights.pruned,
            retained = heights.retained.len(),
            "migrated tendermint client consensus states"
        );
    }
    Ok(())
}

fn upgrade_solo_machine(state: &mut Map<String, Value>, path: &str) -> Result<(), GenesisError> {
    let frozen_sequence = match state.remove("frozen_sequence") {
        None => 0,
        Some(v) => json_u64(&v).ok_or_else(|| {
            GenesisError::malformed_at(&format!("{path}.frozen_sequence"), "expected uint64")
        })?,
    };
    state.insert("@type".into(), Value::String(SOLOMACHINE_V2_CLIENT_STATE.into()));
    state.insert("is_frozen".into(), Value::Bool(frozen_sequence != 0));
    if let Some(consensus) = state.get_mut("consensus_state").and_then(Value::as_object_mut) {
        if consensus.get("@type").and_then(Value::as_str) == Some(SOLOMACHINE_V1_CONSENSUS_STATE) {
            consensus.insert(
                "@type".into(),
                Value::String(SOLOMACHINE_V2_CONSENSUS_STATE.into()),
            );
        }
    }
    Ok(())
}

/// An IBC height, rendered as `{revision_number}-{revision_height}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Height {
    revision_number: u64,
    revision_height: u64,
}

impl Height {
    fn parse(value: Option<&Value>, path: &str) -> Result<Self, GenesisError> {
        let height = value.ok_or_else(|| GenesisError::malformed_at(path, "height is required"))?;
        let number = height.get("revision_number").map_or(Some(0), json_u64);
        let height_num = height.get("revision_height").and_then(json_u64);
        match (number, height_num) {
            (Some(revision_number), Some(revision_height)) => Ok(Self {
                revision_number,
                revision_height,
            }),
            _ => Err(GenesisError::malformed_at(
                path,
                "expected {revision_number, revision_height}",
            )),
        }
    }

    fn consensus_state_key(&self) -> String {
        format!("consensusStates/{self}")
    }

    fn processed_time_key(&self) -> String {
        format!("consensusStates/{self}/processedTime")
    }

    fn processed_height_key(&self) -> String {
        format!("consensusStates/{self}/processedHeight")
    }

    /// `iterateConsensusStates` followed by the big-endian revision number
    /// and revision height, so store iteration visits heights in order.
    fn iteration_key(&self) -> Vec<u8> {
        let mut key = ITERATE_CONSENSUS_STATES.to_vec();
        key.extend_from_slice(&self.revision_number.to_be_bytes());
        key.extend_from_slice(&self.revision_height.to_be_bytes());
        key
    }
}

impl std::fmt::Display for Height {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

/// One client's consensus states after pruning.
#[derive(Debug, Default)]
struct ConsensusHeights {
    pruned: usize,
    /// Surviving heights in export order.
    retained: Vec<Height>,
}

fn prune_expired(
    entry: &mut Map<String, Value>,
    trusting_period: Duration,
    genesis_time: &GenesisTime,
    path: &str,
) -> Result<ConsensusHeights, GenesisError> {
    let mut heights = ConsensusHeights::default();
    let Some(states) = entry.get_mut("consensus_states") else {
        return Ok(heights);
    };
    let states_path = format!("{path}.consensus_states");
    let states = array_mut(states, &states_path)?;

    let mut kept = Vec::with_capacity(states.len());
    for (i, state) in std::mem::take(states).into_iter().enumerate() {
        let state_path = format!("{states_path}[{i}]");
        let height = Height::parse(state.get("height"), &format!("{state_path}.height"))?;
        let timestamp = state
            .get("consensus_state")
            .and_then(|c| c.get("timestamp"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GenesisError::malformed_at(&state_path, "consensus_state.timestamp is required")
            })?;
        let timestamp = GenesisTime::parse(timestamp)
            .map_err(|e| GenesisError::malformed_at(&state_path, e))?;
        let expired = match timestamp.checked_add(trusting_period) {
            Some(expiry) => expiry <= *genesis_time,
            None => false,
        };
        if expired {
            heights.pruned += 1;
        } else {
            heights.retained.push(height);
            kept.push(state);
        }
    }
    *states = kept;
    Ok(heights)
}

fn rewrite_metadata(
    metadata: &mut Value,
    heights: &BTreeMap<String, ConsensusHeights>,
    solo_machines: &BTreeSet<String>,
    self_height: &str,
) -> Result<(), GenesisError> {
    const PATH: &str = "app_state.ibc.client_genesis.clients_metadata";
    let entries = array_mut(metadata, PATH)?;

    let mut kept = Vec::with_capacity(entries.len());
    for (i, mut entry) in std::mem::take(entries).into_iter().enumerate() {
        let path = format!("{PATH}[{i}]");
        let obj = object_mut(&mut entry, &path)?;
        let client_id = str_field(obj, "client_id", &path)?.to_string();
        if solo_machines.contains(&client_id) {
            continue;
        }
        if let Some(client_heights) = heights.get(&client_id) {
            let list = obj
                .entry("client_metadata")
                .or_insert_with(|| json!([]));
            let list = array_mut(list, &format!("{path}.client_metadata"))?;
            rewrite_client_metadata(list, client_heights, self_height, &path)?;
            if list.is_empty() {
                tracing::debug!(%client_id, "dropped client with no remaining metadata");
                continue;
            }
        }
        kept.push(entry);
    }
    *entries = kept;
    Ok(())
}

/// Rebuild one client's metadata from its surviving heights.
///
/// Only heights with a `processedTime` entry produce metadata, each as the
/// triple `processedHeight`, `processedTime`, iteration key. Everything
/// else is dropped.
fn rewrite_client_metadata(
    list: &mut Vec<Value>,
    heights: &ConsensusHeights,
    self_height: &str,
    path: &str,
) -> Result<(), GenesisError> {
    let mut by_key: BTreeMap<Vec<u8>, Value> = BTreeMap::new();
    for entry in std::mem::take(list) {
        let key = entry
            .get("key")
            .and_then(Value::as_str)
            .and_then(|k| BASE64_STANDARD.decode(k).ok())
            .ok_or_else(|| GenesisError::malformed_at(path, "metadata key must be base64"))?;
        by_key.insert(key, entry);
    }

    for height in &heights.retained {
        let Some(processed_time) = by_key.remove(height.processed_time_key().as_bytes()) else {
            continue;
        };
        list.push(metadata_entry(
            height.processed_height_key().as_bytes(),
            self_height.as_bytes(),
        ));
        list.push(processed_time);
        list.push(metadata_entry(
            &height.iteration_key(),
            height.consensus_state_key().as_bytes(),
        ));
    }
    Ok(())
}

fn metadata_entry(key: &[u8], value: &[u8]) -> Value {
    json!({
        "key": BASE64_STANDARD.encode(key),
        "value": BASE64_STANDARD.encode(value),
    })
}

/// Parse a protobuf JSON duration such as `"1209600s"` or `"1.5s"`.
fn parse_proto_duration(raw: &str) -> Option<Duration> {
    let body = raw.strip_suffix('s')?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (secs, frac) = body.split_once('.').unwrap_or((body, ""));
    if secs.is_empty() || frac.len() > 9 {
        return None;
    }
    if !secs.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = secs.parse().ok()?;
    let nanos: i64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().ok()?
    };
    let total = Duration::try_seconds(secs)?.checked_add(&Duration::nanoseconds(nanos))?;
    Some(if negative { -total } else { total })
}

fn json_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn object_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, GenesisError> {
    value
        .as_object_mut()
        .ok_or_else(|| GenesisError::malformed_at(path, "expected a JSON object"))
}

fn array_mut<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Vec<Value>, GenesisError> {
    value
        .as_array_mut()
        .ok_or_else(|| GenesisError::malformed_at(path, "expected a JSON array"))
}

fn str_field<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<&'a str, GenesisError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GenesisError::malformed_at(&format!("{path}.{field}"), "expected a string"))
}
