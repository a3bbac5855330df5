use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

mod config;
mod data;
mod economy;
mod error;
mod events;
mod extract;
mod game;
mod item;
mod persistence;
mod pet;
mod protocol;
mod shop;

use config::ServerConfig;
use data::{GameData, SharedGameData};
use economy::Receipt;
use error::ApiError;
use events::Event;
use extract::{ApiJson, ApiPath};
use game::{GameSession, SessionSnapshot};
use persistence::{PersistenceError, PersistenceReader, PersistenceWriter, SessionSummary};
use protocol::{
    ApiResponse, CleanResponse, ClientItemDef, ClientMessage, ClientSpeciesDef, NewSessionRequest,
    NoiseResponse, ServerMessage, TradeRequest, UseItemRequest, UseItemResponse,
};

/// Messages buffered per session feed before slow clients start lagging
const FEED_CAPACITY: usize = 64;

// ============================================================================
// App State
// ============================================================================

/// A session held in memory plus the feed its WebSocket clients listen on
struct ActiveSession {
    game: RwLock<GameSession>,
    feed: broadcast::Sender<ServerMessage>,
    // Set under the game write lock once the session leaves memory
    closed: AtomicBool,
}

impl ActiveSession {
    fn new(game: GameSession) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            game: RwLock::new(game),
            feed,
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn publish(&self, msg: ServerMessage) {
        // No subscribers is not an error
        let _ = self.feed.send(msg);
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<ServerConfig>,
    data: SharedGameData,
    // Session ID -> in-memory session
    sessions: Arc<DashMap<u32, Arc<ActiveSession>>>,
    writer: Arc<PersistenceWriter>,
    // Held while a new session ID is picked
    id_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(config: ServerConfig, data: GameData) -> Self {
        let writer = PersistenceWriter::new(config.save_file.clone());
        Self {
            config: Arc::new(config),
            data: Arc::new(RwLock::new(Arc::new(data))),
            sessions: Arc::new(DashMap::new()),
            writer: Arc::new(writer),
            id_lock: Arc::new(Mutex::new(())),
        }
    }

    fn session(&self, session_id: u32) -> Result<Arc<ActiveSession>, ApiError> {
        self.sessions
            .get(&session_id)
            .map(|s| Arc::clone(s.value()))
            .ok_or(ApiError::SessionNotActive(session_id))
    }

    /// Collect handles first so no map shard stays locked across an await
    fn active_sessions(&self) -> Vec<(u32, Arc<ActiveSession>)> {
        self.sessions
            .iter()
            .map(|s| (*s.key(), Arc::clone(s.value())))
            .collect()
    }

    async fn game_data(&self) -> Arc<GameData> {
        Arc::clone(&*self.data.read().await)
    }

    async fn read_save_file(&self) -> Result<PersistenceReader, ApiError> {
        let path = self.writer.path().to_path_buf();
        Ok(tokio::task::spawn_blocking(move || PersistenceReader::open(&path)).await??)
    }

    async fn create_session(&self, req: &NewSessionRequest) -> Result<SessionSnapshot, ApiError> {
        if req.player_name.trim().is_empty() || req.pet_name.trim().is_empty() {
            return Err(ApiError::BadRequest("Player and pet names are required".to_string()));
        }

        let data = self.game_data().await;
        let _guard = self.id_lock.lock().await;

        let saved_next = self.read_save_file().await?.next_session_id();
        let active_next = self
            .sessions
            .iter()
            .map(|s| *s.key())
            .max()
            .map_or(1, |id| id.saturating_add(1));
        let session_id = saved_next.max(active_next);

        let game = GameSession::start_new(
            &data,
            self.config.session_settings(),
            session_id,
            &req.player_name,
            self.config.starting_money,
            &req.pet_name,
            &req.species,
            req.breed.as_deref(),
            &mut rand::thread_rng(),
        )?;

        let snapshot = game.snapshot();
        self.sessions.insert(session_id, Arc::new(ActiveSession::new(game)));
        info!(
            "Session {} started for {} with {} the {}",
            session_id, req.player_name, req.pet_name, req.species
        );
        Ok(snapshot)
    }

    /// Load a slot into memory. Clients already watching the session keep their feed.
    async fn load_session(&self, session_id: u32) -> Result<SessionSnapshot, ApiError> {
        let data = self.game_data().await;
        let game = self
            .read_save_file()
            .await?
            .load(session_id, &data, self.config.session_settings())?;
        let snapshot = game.snapshot();

        match self.session(session_id) {
            Ok(active) => {
                *active.game.write().await = game;
                active.publish(ServerMessage::Snapshot(Box::new(snapshot.clone())));
            }
            Err(_) => {
                self.sessions.insert(session_id, Arc::new(ActiveSession::new(game)));
            }
        }
        Ok(snapshot)
    }

    /// Write one session to the save file. Returns false if the session was
    /// closed in the meantime and nothing was written.
    async fn write_session(&self, session_id: u32, active: &ActiveSession) -> Result<bool, ApiError> {
        let data = self.game_data().await;

        // The read lock is held through the write so a concurrent delete
        // cannot be undone by a save that started before it
        let game = active.game.read().await;
        if active.is_closed() {
            return Ok(false);
        }
        let record = PersistenceWriter::session_record(&game, &data)?;

        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || writer.write_record(session_id, &record)).await??;
        drop(game);
        Ok(true)
    }

    /// Take a session out of memory. Waits for any save in flight, and no
    /// save starts after this returns.
    async fn evict(&self, session_id: u32) -> Option<Arc<ActiveSession>> {
        let (_, active) = self.sessions.remove(&session_id)?;
        {
            let _game = active.game.write().await;
            active.closed.store(true, Ordering::SeqCst);
        }
        Some(active)
    }

    async fn save_session(&self, session_id: u32) -> Result<(), ApiError> {
        let active = self.session(session_id)?;
        if !self.write_session(session_id, &active).await? {
            return Err(ApiError::SessionNotActive(session_id));
        }

        let event = active
            .game
            .write()
            .await
            .log(format!("Saved game session ID {}.", session_id));
        active.publish(ServerMessage::Event(event));
        Ok(())
    }

    async fn save_all(&self) -> usize {
        let mut saved = 0;
        for (session_id, active) in self.active_sessions() {
            match self.write_session(session_id, &active).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => warn!("Auto-save failed for session {}: {}", session_id, e),
            }
        }
        saved
    }

    /// Save a session and drop it from memory
    async fn close_session(&self, session_id: u32) -> Result<(), ApiError> {
        let active = self.session(session_id)?;
        self.write_session(session_id, &active).await?;

        if let Some(active) = self.evict(session_id).await {
            active.publish(ServerMessage::Error {
                message: format!("Session {} was closed", session_id),
            });
            info!("Session {} closed", session_id);
        }
        Ok(())
    }

    /// Delete a save slot. An active session with the same ID is dropped too,
    /// so later saves cannot bring the slot back.
    async fn delete_save(&self, session_id: u32) -> Result<(), ApiError> {
        let evicted = self.evict(session_id).await;

        let writer = Arc::clone(&self.writer);
        let existed = tokio::task::spawn_blocking(move || writer.delete_session(session_id)).await??;

        if let Some(active) = &evicted {
            active.publish(ServerMessage::Error {
                message: format!("Session {} was deleted", session_id),
            });
        }
        if !existed && evicted.is_none() {
            return Err(PersistenceError::SessionNotFound(session_id).into());
        }
        Ok(())
    }

    async fn trade(&self, session_id: u32, req: &TradeRequest, selling: bool) -> Result<Receipt, ApiError> {
        let active = self.session(session_id)?;
        let data = self.game_data().await;
        let mut game = active.game.write().await;

        let receipt = if selling {
            game.sell(&data, req.shop, &req.item_id, req.quantity)?
        } else {
            game.buy(&data, req.shop, &req.item_id, req.quantity)?
        };

        active.publish(ServerMessage::Snapshot(Box::new(game.snapshot())));
        Ok(receipt)
    }

    async fn use_item(&self, session_id: u32, item_id: &str) -> Result<UseItemResponse, ApiError> {
        let active = self.session(session_id)?;
        let data = self.game_data().await;
        let mut game = active.game.write().await;

        let applied = game.use_item(&data, item_id)?;
        active.publish(ServerMessage::Snapshot(Box::new(game.snapshot())));
        Ok(UseItemResponse {
            applied,
            pet: game.pet.to_update(),
        })
    }

    async fn clean(&self, session_id: u32) -> Result<CleanResponse, ApiError> {
        let active = self.session(session_id)?;
        let mut game = active.game.write().await;

        let cleaned = game.clean_waste();
        if cleaned > 0 {
            active.publish(ServerMessage::PetUpdate(game.pet.to_update()));
        }
        Ok(CleanResponse { cleaned })
    }

    async fn snapshot(&self, session_id: u32) -> Result<SessionSnapshot, ApiError> {
        let active = self.session(session_id)?;
        let game = active.game.read().await;
        Ok(game.snapshot())
    }

    /// Advance every active session by one tick and push what changed
    async fn tick_sessions(&self) {
        let data = self.game_data().await;
        for (_, active) in self.active_sessions() {
            let mut game = active.game.write().await;
            let outcome = game.tick(&data);

            if outcome.pet_changed {
                active.publish(ServerMessage::PetUpdate(game.pet.to_update()));
            }
            for event in outcome.events {
                active.publish(ServerMessage::Event(event));
            }
        }
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

async fn list_items(State(state): State<AppState>) -> ApiResult<Vec<ClientItemDef>> {
    let data = state.game_data().await;
    Ok(Json(ApiResponse::ok(data.items.to_client_definitions())))
}

async fn list_species(State(state): State<AppState>) -> ApiResult<Vec<ClientSpeciesDef>> {
    let data = state.game_data().await;
    Ok(Json(ApiResponse::ok(data.species.to_client_definitions())))
}

async fn list_saves(State(state): State<AppState>) -> ApiResult<Vec<SessionSummary>> {
    let reader = state.read_save_file().await?;
    Ok(Json(ApiResponse::ok(reader.sessions())))
}

async fn create_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewSessionRequest>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(ApiResponse::ok(state.create_session(&req).await?)))
}

async fn load_session(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(ApiResponse::ok(state.load_session(session_id).await?)))
}

async fn save_session(State(state): State<AppState>, ApiPath(session_id): ApiPath<u32>) -> ApiResult<()> {
    state.save_session(session_id).await?;
    Ok(Json(ApiResponse::ok(())))
}

async fn delete_save(State(state): State<AppState>, ApiPath(session_id): ApiPath<u32>) -> ApiResult<()> {
    state.delete_save(session_id).await?;
    Ok(Json(ApiResponse::ok(())))
}

async fn close_session(State(state): State<AppState>, ApiPath(session_id): ApiPath<u32>) -> ApiResult<()> {
    state.close_session(session_id).await?;
    Ok(Json(ApiResponse::ok(())))
}

async fn get_session(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(ApiResponse::ok(state.snapshot(session_id).await?)))
}

async fn get_events(State(state): State<AppState>, ApiPath(session_id): ApiPath<u32>) -> ApiResult<Vec<Event>> {
    let active = state.session(session_id)?;
    let events = active.game.read().await.events.to_vec();
    Ok(Json(ApiResponse::ok(events)))
}

async fn buy_item(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
    ApiJson(req): ApiJson<TradeRequest>,
) -> ApiResult<Receipt> {
    Ok(Json(ApiResponse::ok(state.trade(session_id, &req, false).await?)))
}

async fn sell_item(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
    ApiJson(req): ApiJson<TradeRequest>,
) -> ApiResult<Receipt> {
    Ok(Json(ApiResponse::ok(state.trade(session_id, &req, true).await?)))
}

async fn use_item(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
    ApiJson(req): ApiJson<UseItemRequest>,
) -> ApiResult<UseItemResponse> {
    Ok(Json(ApiResponse::ok(state.use_item(session_id, &req.item_id).await?)))
}

async fn clean_waste(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
) -> ApiResult<CleanResponse> {
    Ok(Json(ApiResponse::ok(state.clean(session_id).await?)))
}

async fn make_noise(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<u32>,
) -> ApiResult<NoiseResponse> {
    let active = state.session(session_id)?;
    let game = active.game.read().await;
    let noise = game.make_noise(&mut rand::thread_rng());
    Ok(Json(ApiResponse::ok(NoiseResponse { noise })))
}

// ============================================================================
// WebSocket Feed
// ============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    ApiPath(session_id): ApiPath<u32>,
    State(state): State<AppState>,
) -> Response {
    let active = match state.session(session_id) {
        Ok(active) => active,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, active))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: u32, active: Arc<ActiveSession>) {
    let (mut sender, mut receiver) = socket.split();
    let mut feed_rx = active.feed.subscribe();

    // Replies meant only for this client
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    let snapshot = active.game.read().await.snapshot();
    let _ = tx.send(ServerMessage::Snapshot(Box::new(snapshot))).await;

    info!("Client connected to session {}", session_id);

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                Some(msg) = rx.recv() => msg,
                result = feed_rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Feed for session {} lagged, skipped {} message(s)", session_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                else => break,
            };

            match protocol::encode_server_message(&msg) {
                Ok(bytes) => {
                    if sender.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("{}", e),
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Binary(bytes) => {
                    let reply = match protocol::decode_client_message(&bytes) {
                        Ok(client_msg) => handle_client_message(&state, session_id, client_msg).await,
                        Err(e) => {
                            warn!("Bad message on session {}: {}", session_id, e);
                            Some(ServerMessage::Error { message: e })
                        }
                    };
                    if let Some(reply) = reply {
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Client disconnected from session {}", session_id);
}

/// Apply a feed message. Successful actions answer through the session feed,
/// so only snapshots and errors come back directly.
async fn handle_client_message(
    state: &AppState,
    session_id: u32,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    debug!("Session {} received {:?}", session_id, msg);

    let result = match msg {
        ClientMessage::UseItem(req) => state.use_item(session_id, &req.item_id).await.map(|_| None),
        ClientMessage::Clean => state.clean(session_id).await.map(|_| None),
        ClientMessage::Buy(req) => state.trade(session_id, &req, false).await.map(|_| None),
        ClientMessage::Sell(req) => state.trade(session_id, &req, true).await.map(|_| None),
        ClientMessage::RequestSnapshot => state
            .snapshot(session_id)
            .await
            .map(|snapshot| Some(ServerMessage::Snapshot(Box::new(snapshot)))),
    };

    result.unwrap_or_else(|e| {
        Some(ServerMessage::Error {
            message: e.to_string(),
        })
    })
}

// ============================================================================
// Main
// ============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Static data
        .route("/api/items", get(list_items))
        .route("/api/species", get(list_species))
        // Save slots
        .route("/api/saves", get(list_saves))
        .route("/api/saves/:id", delete(delete_save))
        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/load", post(load_session))
        .route("/api/sessions/:id/save", post(save_session))
        .route("/api/sessions/:id/events", get(get_events))
        .route("/api/sessions/:id/buy", post(buy_item))
        .route("/api/sessions/:id/sell", post(sell_item))
        .route("/api/sessions/:id/use", post(use_item))
        .route("/api/sessions/:id/clean", post(clean_waste))
        .route("/api/sessions/:id/noise", get(make_noise))
        // WebSocket
        .route("/ws/:id", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pixelpet=info".parse().unwrap()),
        )
        .init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let game_data = match GameData::load(&config.data_dir) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load game data from {:?}: {}", config.data_dir, e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {} items, {} species and {} shops",
        game_data.items.len(),
        game_data.species.len(),
        game_data.shops.len()
    );

    let state = AppState::new(config, game_data);

    // Start hot-reload watcher for data files (dev mode)
    #[cfg(debug_assertions)]
    {
        if state.config.hot_reload {
            match data::watcher::start_file_watcher(Arc::clone(&state.data), state.config.data_dir.clone()) {
                Ok(mut rx) => {
                    tokio::spawn(async move {
                        while let Some(event) = rx.recv().await {
                            match event {
                                data::DataReloadEvent::Reloaded(path) => {
                                    info!("Data hot-reload: {}", path);
                                }
                                data::DataReloadEvent::Error(e) => {
                                    error!("Data hot-reload error: {}", e);
                                }
                            }
                        }
                    });
                    info!("Data hot-reload enabled");
                }
                Err(e) => {
                    warn!("Failed to start data hot-reload: {}", e);
                }
            }
        }
    }

    // Spawn game tick loop
    let tick_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(tick_state.config.tick_ms.max(1)));
        loop {
            interval.tick().await;
            tick_state.tick_sessions().await;
        }
    });

    // Spawn auto-save loop
    if state.config.autosave_secs > 0 {
        let save_state = state.clone();
        tokio::spawn(async move {
            let period = Duration::from_secs(save_state.config.autosave_secs);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                let saved = save_state.save_all().await;
                if saved > 0 {
                    info!("Auto-saved {} session(s)", saved);
                }
            }
        });
    }

    let addr = state.config.bind_addr;
    let app = build_router(state.clone());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Pet server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!("Server error: {}", e);
    }

    let saved = state.save_all().await;
    info!("Saved {} session(s) on shutdown", saved);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::test_data;
    use crate::pet::PetState;
    use tempfile::TempDir;

    fn test_state(temp_dir: &TempDir) -> AppState {
        let config = ServerConfig {
            save_file: temp_dir.path().join("Persistence.json"),
            tick_ms: 500,
            starting_money: 50,
            ..ServerConfig::default()
        };
        AppState::new(config, test_data())
    }

    fn new_game(species: &str) -> NewSessionRequest {
        NewSessionRequest {
            player_name: "Ash".to_string(),
            pet_name: "Rex".to_string(),
            species: species.to_string(),
            breed: None,
        }
    }

    fn buy_request(item_id: &str, quantity: i32) -> TradeRequest {
        TradeRequest {
            shop: 0,
            item_id: item_id.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_create_session_allocates_ids() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        let first = state.create_session(&new_game("Dog")).await.unwrap();
        let second = state.create_session(&new_game("Dog")).await.unwrap();
        assert_eq!(first.session_id, 1);
        assert_eq!(second.session_id, 2);
        assert_eq!(first.player.money, 50);
        assert_eq!(first.pet.breed, "Beagle");

        let err = state.create_session(&new_game("Cat")).await.err().unwrap();
        assert!(matches!(err, ApiError::Game(game::GameError::UnknownSpecies(_))));

        let mut blank = new_game("Dog");
        blank.pet_name = "  ".to_string();
        assert!(matches!(
            state.create_session(&blank).await.err().unwrap(),
            ApiError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_new_ids_skip_saved_slots() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        state.create_session(&new_game("Dog")).await.unwrap();
        state.save_session(1).await.unwrap();
        state.sessions.clear();

        let snapshot = state.create_session(&new_game("Dog")).await.unwrap();
        assert_eq!(snapshot.session_id, 2);
    }

    #[tokio::test]
    async fn test_save_load_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        state.create_session(&new_game("Dog")).await.unwrap();
        state.trade(1, &buy_request("chicken_food", 2), false).await.unwrap();
        state.save_session(1).await.unwrap();

        // Changes after the save are lost on load
        state.trade(1, &buy_request("chicken_food", 1), false).await.unwrap();
        let loaded = state.load_session(1).await.unwrap();
        assert_eq!(loaded.player.money, 40);
        assert_eq!(loaded.shops[0].stock[0].quantity, 8);

        let saves = state.read_save_file().await.unwrap().sessions();
        assert_eq!(saves.len(), 1);

        state.delete_save(1).await.unwrap();
        let err = state.delete_save(1).await.err().unwrap();
        assert!(matches!(err, ApiError::Persistence(PersistenceError::SessionNotFound(1))));

        let err = state.load_session(1).await.err().unwrap();
        assert!(matches!(err, ApiError::Persistence(PersistenceError::SessionNotFound(1))));
    }

    #[tokio::test]
    async fn test_actions_on_unknown_session() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);

        assert!(matches!(state.snapshot(5).await.err().unwrap(), ApiError::SessionNotActive(5)));
        assert!(matches!(state.clean(5).await.err().unwrap(), ApiError::SessionNotActive(5)));
        assert!(matches!(state.save_session(5).await.err().unwrap(), ApiError::SessionNotActive(5)));
    }

    #[tokio::test]
    async fn test_trade_and_use_publish_snapshots() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();
        let mut feed = state.session(1).unwrap().feed.subscribe();

        let receipt = state.trade(1, &buy_request("chicken_food", 1), false).await.unwrap();
        assert_eq!(receipt.money_left, 45);
        assert!(matches!(feed.try_recv().unwrap(), ServerMessage::Snapshot(_)));

        let response = state.use_item(1, "chicken_food").await.unwrap();
        assert_eq!(response.pet.state, PetState::Happy);
        assert!(matches!(feed.try_recv().unwrap(), ServerMessage::Snapshot(_)));

        let err = state.use_item(1, "chicken_food").await.err().unwrap();
        assert!(matches!(err, ApiError::Game(game::GameError::NotInInventory)));
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_tick_pushes_pet_updates() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();
        let mut feed = state.session(1).unwrap().feed.subscribe();

        for _ in 0..4 {
            state.tick_sessions().await;
        }

        let mut pet_updates = 0;
        while let Ok(msg) = feed.try_recv() {
            if matches!(msg, ServerMessage::PetUpdate(_)) {
                pet_updates += 1;
            }
        }
        assert!(pet_updates > 0);
        assert_eq!(state.snapshot(1).await.unwrap().ticks_passed, 4);
    }

    #[tokio::test]
    async fn test_client_messages() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();

        let reply = handle_client_message(&state, 1, ClientMessage::RequestSnapshot).await;
        assert!(matches!(reply, Some(ServerMessage::Snapshot(_))));

        let reply = handle_client_message(&state, 1, ClientMessage::Buy(buy_request("chicken_food", 1))).await;
        assert!(reply.is_none());

        let reply = handle_client_message(&state, 1, ClientMessage::Buy(buy_request("chicken_food", 500))).await;
        match reply {
            Some(ServerMessage::Error { message }) => assert_eq!(message, "Insufficient stock"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_all() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();
        state.create_session(&new_game("Dog")).await.unwrap();

        assert_eq!(state.save_all().await, 2);
        let ids: Vec<u32> = state
            .read_save_file()
            .await
            .unwrap()
            .sessions()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_deleted_save_stays_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();
        state.save_session(1).await.unwrap();
        let mut feed = state.session(1).unwrap().feed.subscribe();

        state.delete_save(1).await.unwrap();
        assert!(matches!(state.session(1).err().unwrap(), ApiError::SessionNotActive(1)));
        assert!(matches!(feed.recv().await.unwrap(), ServerMessage::Error { .. }));

        assert_eq!(state.save_all().await, 0);
        assert!(state.read_save_file().await.unwrap().sessions().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unsaved_active_session() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();

        state.delete_save(1).await.unwrap();
        assert_eq!(state.save_all().await, 0);
        assert!(state.read_save_file().await.unwrap().sessions().is_empty());
    }

    #[tokio::test]
    async fn test_close_session_saves_and_unloads() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();
        state.trade(1, &buy_request("chicken_food", 1), false).await.unwrap();

        state.close_session(1).await.unwrap();
        assert!(matches!(state.session(1).err().unwrap(), ApiError::SessionNotActive(1)));
        assert_eq!(state.save_all().await, 0);
        assert!(matches!(state.close_session(1).await.err().unwrap(), ApiError::SessionNotActive(1)));

        let loaded = state.load_session(1).await.unwrap();
        assert_eq!(loaded.player.money, 45);
    }

    async fn raw_request(state: AppState, request: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_malformed_requests_get_json_errors() {
        let temp_dir = TempDir::new().unwrap();
        let state = test_state(&temp_dir);
        state.create_session(&new_game("Dog")).await.unwrap();

        let response = raw_request(
            state.clone(),
            "GET /api/sessions/abc HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 400"), "{}", response);
        assert!(response.contains(r#""success":false"#), "{}", response);

        let body = r#"{"item_id":"chicken_food","quantity":"two"}"#;
        let request = format!(
            "POST /api/sessions/1/buy HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let response = raw_request(state, &request).await;
        assert!(response.starts_with("HTTP/1.1 400"), "{}", response);
        assert!(response.contains(r#""success":false"#), "{}", response);
    }
}
