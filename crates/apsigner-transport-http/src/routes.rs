//! Route handlers (spec §6). `/sign` and `/plan` share a conversion +
//! lookup-building step; they differ only in whether the pipeline signs.

use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::{
    BatchRequest, BatchResponse, DeleteQuery, GenerateRequest, GenerateResponse, KeyTypeInfo, KeyTypesResponse, KeysResponse,
};
use apsigner_broker::{generate_warnings, EntryRole, EntrySummary, HardLinter};
use apsigner_planner::{Entry, KeyEntry, Pipeline, StaticKeyLookup, Txn};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::collections::BTreeSet;
use std::time::Instant;

const KEYS_CHECKSUM_HEADER: &str = "x-keys-checksum";

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/sign", post(sign))
        .route("/plan", post(plan))
        .route("/keys", get(list_keys))
        .route("/keytypes", get(list_key_types))
        .route("/admin/generate", post(generate))
        .route("/admin/keys", delete(delete_key))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), crate::auth::require_bearer_token));

    let public = Router::new().route("/health", get(health));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn addr_of(bytes: &Option<Vec<u8>>) -> Option<String> {
    bytes
        .as_ref()
        .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
        .map(|a| apsigner_crypto::address::encode_address(&a))
}

fn entry_summary(role: EntryRole, txn: &Txn, auth_address: Option<String>) -> EntrySummary {
    EntrySummary {
        role: Some(role),
        sender: <[u8; 32]>::try_from(txn.sender.as_slice())
            .ok()
            .map(|a| apsigner_crypto::address::encode_address(&a)),
        auth_address,
        rekey_to: addr_of(&txn.rekey_to),
        close_remainder_to: addr_of(&txn.close_remainder_to),
        asset_close_to: addr_of(&txn.asset_close_to),
        asset_sender: addr_of(&txn.asset_sender),
        fee: txn.fee,
        first_valid: Some(txn.first_valid),
        last_valid: Some(txn.last_valid),
    }
}

fn into_parts(wire: crate::wire::SignEntryWire) -> Result<(Entry, EntrySummary, Option<String>), ApiError> {
    if let Some(signed_hex) = wire.signed_txn_hex {
        let bytes = hex::decode(&signed_hex).map_err(|_| ApiError::BadRequest("signed_txn_hex is not valid hex".into()))?;
        return Ok((Entry::Passthrough { signed_txn_bytes: bytes }, EntrySummary::new(EntryRole::Passthrough), None));
    }
    let txn_hex = wire
        .txn_bytes_hex
        .ok_or_else(|| ApiError::BadRequest("request must set txn_bytes_hex or signed_txn_hex".into()))?;
    let txn_bytes = hex::decode(&txn_hex).map_err(|_| ApiError::BadRequest("txn_bytes_hex is not valid hex".into()))?;
    let decoded = Txn::decode(&txn_bytes).map_err(|_| ApiError::BadRequest("malformed transaction".into()))?;

    if let Some(auth_address) = wire.auth_address {
        let summary = entry_summary(EntryRole::Sign, &decoded, Some(auth_address.clone()));
        return Ok((
            Entry::Sign { txn_bytes, auth_address: auth_address.clone(), lsig_args: wire.lsig_args },
            summary,
            Some(auth_address),
        ));
    }

    let summary = entry_summary(EntryRole::Foreign, &decoded, None);
    Ok((Entry::Foreign { txn_bytes, lsig_size_hint: wire.lsig_size }, summary, None))
}

async fn build_lookup(state: &AppState, addresses: impl Iterator<Item = String>) -> StaticKeyLookup {
    let mut lookup = StaticKeyLookup::new();
    let unique: BTreeSet<String> = addresses.collect();
    for address in unique {
        if let Ok((key_type, category, private_bytes, lsig_bytecode, _schema)) = state.keystore.signing_material(&address).await {
            lookup.insert(address, KeyEntry { key_type, category, lsig_bytecode, private_bytes });
        }
    }
    lookup
}

async fn run_batch(state: &AppState, body: BatchRequest, sign: bool) -> Result<BatchResponse, ApiError> {
    if !state.keystore.is_unlocked().await {
        return Err(ApiError::SignerLocked);
    }

    let mut entries = Vec::with_capacity(body.requests.len());
    let mut summaries = Vec::with_capacity(body.requests.len());
    let mut addresses = Vec::new();
    for wire in body.requests {
        let (entry, summary, address) = into_parts(wire)?;
        if let Some(a) = address {
            addresses.push(a);
        }
        entries.push(entry);
        summaries.push(summary);
    }

    let sign_count = summaries.iter().filter(|s| s.role == Some(EntryRole::Sign)).count();
    let passthrough_count = summaries.iter().filter(|s| s.role == Some(EntryRole::Passthrough)).count();
    let foreign_count = summaries.iter().filter(|s| s.role == Some(EntryRole::Foreign)).count();
    let description = format!("{sign_count} to sign, {passthrough_count} passthrough, {foreign_count} foreign");

    if sign {
        state.broker.submit(summaries, description).await?;
    } else {
        // A dry run never holds a signature or reaches the approval queue
        // (spec §4.4: `/plan` previews the mutation pipeline only); the
        // hard linter still runs so the preview matches what `/sign` would
        // actually reject.
        let linter = HardLinter::new();
        linter.lint(&summaries).map_err(ApiError::PolicyHard)?;
        let _ = generate_warnings(&summaries);
    }

    let lookup = build_lookup(state, addresses.into_iter()).await;
    let pipeline = Pipeline::new(&lookup, &state.providers, &state.lsig);
    let started = Instant::now();
    let (transactions, mutations) = if sign {
        pipeline.sign(entries, state.allow_group_modification)?
    } else {
        pipeline.plan(entries, state.allow_group_modification)?
    };
    metrics::histogram!("apsigner_pipeline_seconds", "op" => if sign { "sign" } else { "plan" }).record(started.elapsed().as_secs_f64());

    Ok(BatchResponse {
        transactions: transactions.into_iter().map(hex::encode).collect(),
        mutations,
    })
}

async fn sign(State(state): State<AppState>, Json(body): Json<BatchRequest>) -> Result<Json<BatchResponse>, ApiError> {
    metrics::counter!("apsigner_sign_requests_total").increment(1);
    let result = run_batch(&state, body, true).await;
    if result.is_err() {
        metrics::counter!("apsigner_sign_requests_failed_total").increment(1);
    }
    Ok(Json(result?))
}

async fn plan(State(state): State<AppState>, Json(body): Json<BatchRequest>) -> Result<Json<BatchResponse>, ApiError> {
    Ok(Json(run_batch(&state, body, false).await?))
}

async fn list_keys(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let (keys, checksum) = state.keystore.list().await?;
    let header_name = HeaderName::from_static(KEYS_CHECKSUM_HEADER);
    if let Some(given) = headers.get(&header_name).and_then(|v| v.to_str().ok()) {
        if given == checksum {
            return Ok((StatusCode::NOT_MODIFIED, [(header_name, checksum)], ()).into_response());
        }
    }
    let body = Json(KeysResponse { count: keys.len(), keys });
    Ok(([(header_name, checksum)], body).into_response())
}

async fn list_key_types(State(state): State<AppState>) -> Json<KeyTypesResponse> {
    let mut key_types = vec![KeyTypeInfo {
        key_type: "ed25519".to_string(),
        category: apsigner_providers::KeyCategory::Ed25519,
        creation_params: Vec::new(),
        runtime_args_schema: Vec::new(),
    }];
    for key_type in state.lsig.key_types().map(str::to_string).collect::<Vec<_>>() {
        key_types.push(KeyTypeInfo {
            category: state.lsig.category(&key_type).expect("listed key type resolves in its own registry"),
            creation_params: state.lsig.creation_params(&key_type).expect("listed key type resolves").to_vec(),
            runtime_args_schema: state.lsig.runtime_args_schema(&key_type).expect("listed key type resolves").to_vec(),
            key_type,
        });
    }
    Json(KeyTypesResponse { key_types })
}

async fn generate(State(state): State<AppState>, Json(body): Json<GenerateRequest>) -> Result<Json<GenerateResponse>, ApiError> {
    let (address, _mnemonic) = state.keystore.generate(&body.key_type, body.parameters.clone()).await?;
    state.broker.notify_keys_changed().await;
    Ok(Json(GenerateResponse { address, key_type: body.key_type, parameters: body.parameters }))
}

async fn delete_key(State(state): State<AppState>, Query(query): Query<DeleteQuery>) -> Result<StatusCode, ApiError> {
    state.keystore.delete(&query.address).await?;
    state.broker.notify_keys_changed().await;
    Ok(StatusCode::NO_CONTENT)
}
