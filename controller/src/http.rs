use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use thermostat_core::{EngineAction, Setting, SettingError, StationRecord};

use crate::{
    engine::{ActionSink, SharedController},
    poller::PollerSettings,
    status::StatusBoard,
};

#[derive(Clone)]
pub struct AppState {
    pub controller: SharedController,
    pub station: Arc<StationRecord>,
    pub board: Arc<StatusBoard>,
    pub sink: ActionSink,
    pub poller: Arc<watch::Sender<PollerSettings>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct BusyBody {
    id: String,
}

#[derive(Debug, Serialize)]
struct AppliedBody {
    applied: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/json", get(handle_get_json))
        .route("/set", get(handle_set))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_get_json(State(state): State<AppState>) -> axum::response::Response {
    match state.board.read().await {
        Ok(status) => Json(status).into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(BusyBody {
                id: state.station.identity().id,
            }),
        )
            .into_response(),
    }
}

async fn handle_set(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> axum::response::Response {
    if pairs.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No settings given");
    }

    let settings = match parse_pairs(&pairs) {
        Ok(settings) => settings,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let applied = settings.len();

    let actions = apply_settings(&state, settings).await;
    state.sink.execute_engine_actions(actions).await;
    info!("applied {applied} remote setting(s)");

    Json(AppliedBody { applied }).into_response()
}

pub fn parse_pairs(pairs: &[(String, String)]) -> Result<Vec<Setting>, SettingError> {
    pairs
        .iter()
        .map(|(key, value)| Setting::parse(key, value))
        .collect()
}

pub async fn apply_settings(state: &AppState, settings: Vec<Setting>) -> Vec<EngineAction> {
    let mut actions = Vec::new();
    let mut controller = state.controller.lock().await;
    let engine = &mut controller.engine;

    for setting in settings {
        match &setting {
            Setting::FanMode(mode) => actions.extend(engine.set_fan_mode(*mode)),
            Setting::AcMode(mode) => actions.extend(engine.set_ac_mode(*mode)),
            Setting::CoolTarget(temp) => actions.extend(engine.set_cool_target(*temp)),
            Setting::HeatTarget(temp) => actions.extend(engine.set_heat_target(*temp)),
            Setting::HystTrigger(trigger) => {
                let (_, release) = engine.hysteresis();
                actions.extend(engine.set_hysteresis(*trigger, release));
            }
            Setting::HystRelease(release) => {
                let (trigger, _) = engine.hysteresis();
                actions.extend(engine.set_hysteresis(trigger, *release));
            }
            Setting::FilterSeconds(seconds) => {
                let mut usage = engine.usage();
                usage.filter_sec = *seconds;
                engine.set_usage(usage);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::CoolSeconds(seconds) => {
                let mut usage = engine.usage();
                usage.cool_sec = *seconds;
                engine.set_usage(usage);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::HeatSeconds(seconds) => {
                let mut usage = engine.usage();
                usage.heat_sec = *seconds;
                engine.set_usage(usage);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::ExtServer(server) => {
                let server = server.clone();
                state.poller.send_modify(|poller| poller.server = server);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::ExtReadSeconds(seconds) => {
                let seconds = *seconds;
                state.poller.send_modify(|poller| poller.read_secs = seconds);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::Id(id) => {
                let id = id.clone();
                state.station.set_identity(|identity| identity.id = id);
                actions.push(EngineAction::Persist(setting));
            }
            Setting::Tag(tag) => {
                let tag = tag.clone();
                state.station.set_identity(|identity| identity.tag = tag);
                actions.push(EngineAction::Persist(setting));
            }
        }
    }

    controller.mirror_into(&state.station);
    actions
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use thermostat_core::{ControlConfig, Identity, PersistedSettings};

    use super::*;
    use crate::{
        bus::bus_channel,
        engine::Controller,
        store::{MemoryStore, SettingsWriter},
    };

    fn state() -> (AppState, Arc<MemoryStore>, watch::Receiver<PollerSettings>) {
        let (station, _writer) = StationRecord::new(Identity {
            id: "Thermostat".to_string(),
            tag: String::new(),
        });
        let store = Arc::new(MemoryStore::default());
        let writer = Arc::new(SettingsWriter::new(store.clone(), PersistedSettings::default()));
        let (tx, _rx) = bus_channel(64);
        let (poller, poller_rx) = watch::channel(PollerSettings::default());
        let state = AppState {
            controller: Controller::new(ControlConfig::default(), &PersistedSettings::default())
                .shared(),
            board: Arc::new(StatusBoard::new(station.snapshot(), &ControlConfig::default())),
            station,
            sink: ActionSink::new(tx, writer),
            poller: Arc::new(poller),
        };
        (state, store, poller_rx)
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn one_bad_pair_rejects_the_request() {
        let result = parse_pairs(&pairs(&[("cool_to", "74"), ("heat_to", "cold")]));

        assert!(matches!(result, Err(SettingError::InvalidValue { key: "heat_to", .. })));
    }

    #[tokio::test]
    async fn settings_reach_engine_poller_and_identity() {
        let (state, _store, poller) = state();
        let settings = parse_pairs(&pairs(&[
            ("cool_to", "200"),
            ("hyst_release", "0.25"),
            ("ext_server", "10.0.0.7"),
            ("ext_read_sec", "30"),
            ("tag", "Bedroom"),
            ("filter_sec", "0"),
        ]))
        .unwrap();

        let actions = apply_settings(&state, settings).await;

        let controller = state.controller.lock().await;
        assert_eq!(controller.engine.cool_target(), 90);
        assert_eq!(controller.engine.hysteresis(), (1.5, 0.25));
        assert_eq!(
            *poller.borrow(),
            PollerSettings {
                server: "10.0.0.7".to_string(),
                read_secs: 30,
            }
        );
        assert_eq!(state.station.identity().tag, "Bedroom");
        assert_eq!(state.station.cool_target(), 90);
        assert!(actions.contains(&EngineAction::Persist(Setting::CoolTarget(90))));
        assert!(actions.contains(&EngineAction::Persist(Setting::Tag("Bedroom".to_string()))));
    }

    #[tokio::test(start_paused = true)]
    async fn busy_snapshot_answers_503_with_the_id() {
        let (state, _store, _poller) = state();
        let board = state.board.clone();
        let _guard = board.hold().await;

        let response = handle_get_json(State(state)).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "id": "Thermostat" }));
    }

    #[tokio::test]
    async fn usage_reset_replaces_counters() {
        let (state, store, _poller) = state();
        state
            .controller
            .lock()
            .await
            .engine
            .set_usage(thermostat_core::UsageCounters {
                filter_sec: 500,
                cool_sec: 200,
                heat_sec: 100,
            });

        let actions = apply_settings(&state, vec![Setting::FilterSeconds(0)]).await;
        state.sink.execute_engine_actions(actions).await;

        assert_eq!(state.controller.lock().await.engine.usage().filter_sec, 0);
        assert_eq!(state.station.usage().cool_sec, 200);
        assert_eq!(store.snapshot().await.filter_sec, 0);
    }
}
