use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::api::TaskClient;
use crate::auth::{AuthForm, AuthMode};
use crate::dashboard::{Dashboard, Effect, Focus, Modal, RemoteCall};
use crate::event::{AppEvent, RemoteEvent, Route};
use crate::guard::{GuardState, SessionGuard};
use crate::notify::{Toast, Toasts};
use crate::storage::{Storage, TOKEN_KEY};

pub enum Screen {
    Auth(AuthForm),
    Dashboard {
        guard: SessionGuard,
        board: Dashboard,
    },
    NotFound,
}

pub struct App {
    pub route: Route,
    pub screen: Screen,
    pub toasts: Toasts,
    storage: Arc<dyn Storage>,
    client: TaskClient,
    tx: UnboundedSender<AppEvent>,
    generation: u64,
    quit: bool,
}

impl App {
    pub fn new(storage: Arc<dyn Storage>, client: TaskClient, tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            route: Route::SignIn,
            screen: Screen::Auth(AuthForm::new(AuthMode::SignIn)),
            toasts: Toasts::default(),
            storage,
            client,
            tx,
            generation: 0,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Replaces the current screen. Leaving the dashboard drops its guard, which
    /// cancels any redirect it had scheduled.
    pub fn navigate(&mut self, route: Route) {
        info!(from = ?self.route, to = ?route, "navigating");
        self.screen = match route {
            Route::SignIn => Screen::Auth(AuthForm::new(AuthMode::SignIn)),
            Route::SignUp => Screen::Auth(AuthForm::new(AuthMode::SignUp)),
            Route::Dashboard => self.mount_dashboard(),
            Route::NotFound => Screen::NotFound,
        };
        self.route = route;
    }

    fn mount_dashboard(&mut self) -> Screen {
        // tear the old guard down before the new one checks
        self.screen = Screen::NotFound;
        self.generation += 1;
        let mut guard = SessionGuard::new(self.storage.clone(), self.tx.clone());
        let mut board = Dashboard::new();
        if let Some(claims) = guard.mount() {
            let call = board.mount(claims);
            self.dispatch(call);
        }
        Screen::Dashboard { guard, board }
    }

    pub fn tick(&mut self, now: Instant) {
        self.toasts.prune(now);
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Navigate(route) => self.navigate(route),
            AppEvent::Notify(toast) => self.toasts.push(toast, now),
            AppEvent::Remote(remote) => self.handle_remote(remote, now),
        }
    }

    fn handle_remote(&mut self, event: RemoteEvent, now: Instant) {
        match event {
            RemoteEvent::SignedUp(outcome) => {
                let Screen::Auth(form) = &mut self.screen else {
                    return;
                };
                form.finish(outcome.is_ok());
                match outcome {
                    Ok(reply) => {
                        self.toasts.push(Toast::success(reply.message), now);
                        self.navigate(Route::SignIn);
                    }
                    Err(failure) => self.toasts.push(Toast::error(failure.message), now),
                }
            }
            RemoteEvent::SignedIn(outcome) => {
                let Screen::Auth(form) = &mut self.screen else {
                    return;
                };
                let reply = match outcome {
                    Ok(reply) => reply,
                    Err(failure) => {
                        form.finish(false);
                        self.toasts.push(Toast::error(failure.message), now);
                        return;
                    }
                };
                if let Err(err) = self.storage.set(TOKEN_KEY, &reply.data) {
                    error!(%err, "could not store credential");
                    form.finish(false);
                    self.toasts.push(Toast::error("Failed to Signin"), now);
                    return;
                }
                form.finish(true);
                self.toasts.push(Toast::success(reply.message), now);
                self.navigate(Route::Dashboard);
            }
            RemoteEvent::TasksFetched {
                generation,
                outcome,
            } => {
                let Some(board) = self.board_for(generation) else {
                    return;
                };
                let toast = board.apply_fetch(outcome);
                self.toasts.push(toast, now);
            }
            RemoteEvent::Mutated {
                generation,
                mutation,
                outcome,
            } => {
                let Some(board) = self.board_for(generation) else {
                    return;
                };
                let (toast, next) = board.apply_mutation(mutation, outcome);
                self.toasts.push(toast, now);
                if let Some(call) = next {
                    self.dispatch(call);
                }
            }
        }
    }

    /// The mounted board, if it is the one that issued a call in `generation`.
    fn board_for(&mut self, generation: u64) -> Option<&mut Dashboard> {
        match &mut self.screen {
            Screen::Dashboard { board, .. } if generation == self.generation => Some(board),
            _ => {
                debug!(generation, current = self.generation, "dropping stale result");
                None
            }
        }
    }

    /// Runs a remote call off the event loop; its result comes back as an event.
    fn dispatch(&self, call: RemoteCall) {
        let token = self.storage.get(TOKEN_KEY).unwrap_or_default();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let event = match call {
                RemoteCall::Fetch => RemoteEvent::TasksFetched {
                    generation,
                    outcome: client.list(&token).await,
                },
                RemoteCall::Create { body, mutation } => RemoteEvent::Mutated {
                    generation,
                    mutation,
                    outcome: client.create(&token, &body).await,
                },
                RemoteCall::Update { id, body, mutation } => RemoteEvent::Mutated {
                    generation,
                    mutation,
                    outcome: client.update(&token, &id, &body).await,
                },
                RemoteCall::Delete { id, mutation } => RemoteEvent::Mutated {
                    generation,
                    mutation,
                    outcome: client.delete(&token, &id).await,
                },
            };
            let _ = tx.send(AppEvent::Remote(event));
        });
    }

    fn apply(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::Notify(toast) => self.toasts.push(toast, now),
            Effect::Call(call) => self.dispatch(call),
            Effect::SignOut => {
                if let Err(err) = self.storage.remove(TOKEN_KEY) {
                    error!(%err, "could not clear credential");
                }
                self.navigate(Route::SignIn);
            }
        }
    }

    pub fn handle_input(&mut self, event: Event, now: Instant) {
        if let Screen::Dashboard { guard, .. } = &mut self.screen {
            if guard.on_event(&event, now) {
                return;
            }
        }
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        match self.screen {
            Screen::Auth(_) => self.auth_key(key),
            Screen::Dashboard { .. } => self.dashboard_key(key, now),
            Screen::NotFound => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                KeyCode::Enter | KeyCode::Char('h') => self.navigate(Route::Dashboard),
                _ => {}
            },
        }
    }

    fn auth_key(&mut self, key: KeyEvent) {
        let Screen::Auth(form) = &mut self.screen else {
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => form.next_field(),
            KeyCode::Char('p') if ctrl => form.toggle_password(),
            KeyCode::Char('s') if ctrl => {
                let other = match form.mode {
                    AuthMode::SignIn => Route::SignUp,
                    AuthMode::SignUp => Route::SignIn,
                };
                self.navigate(other);
            }
            KeyCode::Enter => {
                let Some((email, password)) = form.submit() else {
                    return;
                };
                let mode = form.mode;
                let client = self.client.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let event = match mode {
                        AuthMode::SignIn => {
                            RemoteEvent::SignedIn(client.signin(&email, &password).await)
                        }
                        AuthMode::SignUp => {
                            RemoteEvent::SignedUp(client.signup(&email, &password).await)
                        }
                    };
                    let _ = tx.send(AppEvent::Remote(event));
                });
            }
            _ => form.edit(&key),
        }
    }

    fn dashboard_key(&mut self, key: KeyEvent, now: Instant) {
        let Screen::Dashboard { guard, board } = &mut self.screen else {
            return;
        };
        if guard.state() != GuardState::Granted {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.quit = true;
            }
            return;
        }

        let effect = match board.modal.clone() {
            Modal::Create | Modal::Edit(_) => match key.code {
                KeyCode::Esc => {
                    board.close_modal();
                    None
                }
                KeyCode::Tab | KeyCode::BackTab => {
                    board.form.next_field();
                    None
                }
                KeyCode::Enter => board.submit_form(),
                _ => {
                    board.form.edit(&key);
                    None
                }
            },
            Modal::Delete(_) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => board.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Esc => {
                    board.close_modal();
                    None
                }
                _ => None,
            },
            Modal::Logout => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => Some(board.confirm_logout()),
                KeyCode::Char('n') | KeyCode::Esc => {
                    board.close_modal();
                    None
                }
                _ => None,
            },
            Modal::None if board.focus == Focus::Search => {
                match key.code {
                    KeyCode::Esc | KeyCode::Enter => board.focus = Focus::List,
                    _ => board.edit_search(&key),
                }
                None
            }
            Modal::None => match key.code {
                KeyCode::Char('q') => {
                    self.quit = true;
                    None
                }
                KeyCode::Char('/') => {
                    board.focus = Focus::Search;
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    board.select_prev();
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    board.select_next();
                    None
                }
                KeyCode::Left => {
                    board.cycle_filter(false);
                    None
                }
                KeyCode::Right | KeyCode::Tab => {
                    board.cycle_filter(true);
                    None
                }
                KeyCode::Char('a') | KeyCode::Char('n') => {
                    board.open_create();
                    None
                }
                KeyCode::Char('e') => {
                    board.open_edit();
                    None
                }
                KeyCode::Char('d') | KeyCode::Delete => {
                    board.open_delete();
                    None
                }
                KeyCode::Char(' ') | KeyCode::Char('x') => board.toggle_selected(),
                KeyCode::Char('r') => {
                    board.loading = true;
                    Some(Effect::Call(RemoteCall::Fetch))
                }
                KeyCode::Char('L') => {
                    board.open_logout();
                    None
                }
                _ => None,
            },
        };
        if let Some(effect) = effect {
            self.apply(effect, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Failure, Reply};
    use crate::dashboard::Mutation;
    use crate::error::ApiError;
    use crate::storage::MemoryStorage;
    use crate::task::Task;
    use crate::token::forge;
    use reqwest::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_input(press(KeyCode::Char(c)), Instant::now());
        }
    }

    fn fresh_token() -> String {
        forge(&json!({"exp": Utc::now().timestamp() + 3600, "email": "a@b.co"}))
    }

    fn app_with(
        storage: Arc<MemoryStorage>,
        base_url: &str,
    ) -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(storage, TaskClient::new(base_url), tx), rx)
    }

    async fn pump(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>) {
        let event = rx.recv().await.expect("event");
        app.handle_event(event, Instant::now());
    }

    fn board(app: &App) -> &Dashboard {
        match &app.screen {
            Screen::Dashboard { board, .. } => board,
            _ => panic!("not on the dashboard"),
        }
    }

    async fn task_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Fetched tasks successfully",
                "tasks": [{"_id": "1", "title": "Buy milk", "dueDate": "01-05-2024", "complete": false}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn dashboard_without_session_redirects_to_signin() {
        let (mut app, mut rx) = app_with(Arc::new(MemoryStorage::new()), "http://127.0.0.1:9");
        app.navigate(Route::Dashboard);
        assert!(matches!(
            &app.screen,
            Screen::Dashboard { guard, .. } if guard.state() == GuardState::Denied
        ));

        pump(&mut app, &mut rx).await; // expiry notice
        assert!(!app.toasts.is_empty());
        pump(&mut app, &mut rx).await; // deferred redirect
        assert_eq!(app.route, Route::SignIn);
        assert!(matches!(app.screen, Screen::Auth(_)));
    }

    #[tokio::test]
    async fn dashboard_fetches_then_toggle_refetches() {
        let server = task_server().await;
        Mock::given(method("PUT"))
            .and(path("/api/task/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut app, mut rx) = app_with(storage, &server.uri());
        app.navigate(Route::Dashboard);
        assert!(board(&app).loading);

        pump(&mut app, &mut rx).await;
        assert_eq!(board(&app).tasks.len(), 1);
        assert_eq!(
            board(&app).user.as_ref().and_then(|u| u.display_name()),
            Some("a@b.co")
        );

        app.handle_input(press(KeyCode::Char(' ')), Instant::now());
        assert!(board(&app).tasks[0].complete);

        pump(&mut app, &mut rx).await; // update settled, refetch issued
        assert!(board(&app).loading_task.is_none());
        pump(&mut app, &mut rx).await; // server copy replaces the optimistic one
        assert!(!board(&app).tasks[0].complete);
    }

    #[tokio::test]
    async fn results_from_a_previous_board_are_dropped() {
        let server = task_server().await;
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut app, _rx) = app_with(storage, &server.uri());
        app.navigate(Route::Dashboard);
        let stale = app.generation;
        app.navigate(Route::Dashboard);

        let old = Task {
            id: "old".into(),
            title: "from the last session".into(),
            due_date: "01-05-2024".into(),
            complete: false,
        };
        app.handle_event(
            AppEvent::Remote(RemoteEvent::Mutated {
                generation: stale,
                mutation: Mutation::Delete { task: old.clone(), index: 0 },
                outcome: Err(Failure {
                    message: "Failed to delete task",
                    error: ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR),
                }),
            }),
            Instant::now(),
        );
        app.handle_event(
            AppEvent::Remote(RemoteEvent::TasksFetched {
                generation: stale,
                outcome: Ok(Reply {
                    message: "Tasks fetched successfully",
                    data: vec![old],
                }),
            }),
            Instant::now(),
        );

        assert!(board(&app).tasks.is_empty());
        assert!(app.toasts.is_empty());
    }

    #[tokio::test]
    async fn logout_clears_credential() {
        let server = task_server().await;
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut app, mut rx) = app_with(storage.clone(), &server.uri());
        app.navigate(Route::Dashboard);
        pump(&mut app, &mut rx).await;

        app.handle_input(press(KeyCode::Char('L')), Instant::now());
        assert_eq!(board(&app).modal, Modal::Logout);
        app.handle_input(press(KeyCode::Char('y')), Instant::now());

        assert_eq!(storage.get(TOKEN_KEY), None);
        assert_eq!(app.route, Route::SignIn);
    }

    #[tokio::test]
    async fn signin_stores_token_and_opens_dashboard() {
        let server = task_server().await;
        let token = fresh_token();
        Mock::given(method("POST"))
            .and(path("/api/user/signin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "User Signed in succesfully",
                "token": token.clone()
            })))
            .mount(&server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let (mut app, mut rx) = app_with(storage.clone(), &server.uri());
        type_text(&mut app, "a@b.co");
        app.handle_input(press(KeyCode::Tab), Instant::now());
        type_text(&mut app, "hunter22");
        app.handle_input(press(KeyCode::Enter), Instant::now());

        pump(&mut app, &mut rx).await;
        assert_eq!(storage.get(TOKEN_KEY), Some(token));
        assert_eq!(app.route, Route::Dashboard);
        assert!(matches!(
            &app.screen,
            Screen::Dashboard { guard, .. } if guard.state() == GuardState::Granted
        ));
    }

    #[tokio::test]
    async fn failed_signup_stays_put() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/user/signup"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (mut app, mut rx) = app_with(Arc::new(MemoryStorage::new()), &server.uri());
        app.navigate(Route::SignUp);
        type_text(&mut app, "a@b.co");
        app.handle_input(press(KeyCode::Tab), Instant::now());
        type_text(&mut app, "hunter22");
        app.handle_input(press(KeyCode::Enter), Instant::now());

        pump(&mut app, &mut rx).await;
        assert_eq!(app.route, Route::SignUp);
        let messages: Vec<_> = app.toasts.visible().map(|t| t.message.clone()).collect();
        assert_eq!(messages, ["Failed to Signup"]);
        match &app.screen {
            Screen::Auth(form) => assert!(!form.loading),
            _ => panic!("left the signup screen"),
        }
    }
}
