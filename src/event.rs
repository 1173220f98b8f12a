use crate::api::Outcome;
use crate::dashboard::Mutation;
use crate::notify::Toast;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    Dashboard,
    NotFound,
}

impl Route {
    /// Resolves a path the way the router does; unknown paths land on `NotFound`.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "" => Route::Dashboard,
            "/signin" => Route::SignIn,
            "/signup" => Route::SignUp,
            _ => Route::NotFound,
        }
    }
}

/// Results of remote calls, delivered back to the event loop. Dashboard
/// results carry the mount generation of the board that issued them.
#[derive(Debug)]
pub enum RemoteEvent {
    SignedUp(Outcome<()>),
    SignedIn(Outcome<String>),
    TasksFetched {
        generation: u64,
        outcome: Outcome<Vec<Task>>,
    },
    Mutated {
        generation: u64,
        mutation: Mutation,
        outcome: Outcome<()>,
    },
}

/// Everything that reaches the event loop besides terminal input.
#[derive(Debug)]
pub enum AppEvent {
    Navigate(Route),
    Notify(Toast),
    Remote(RemoteEvent),
}
