use chrono::NaiveDate;
use crossterm::event::KeyEvent;
use tracing::{debug, info};

use crate::api::Outcome;
use crate::input::TextInput;
use crate::notify::Toast;
use crate::task::{to_day_first, to_year_first, Task, TaskBody};
use crate::token::Claims;

const PROVISIONAL_PREFIX: &str = "pending-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Incomplete,
    Complete,
}

impl StatusFilter {
    pub const ALL: [StatusFilter; 3] = [
        StatusFilter::All,
        StatusFilter::Incomplete,
        StatusFilter::Complete,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Incomplete => "Incomplete",
            StatusFilter::Complete => "Complete",
        }
    }

    fn admits(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Incomplete => !task.complete,
            StatusFilter::Complete => task.complete,
        }
    }

    fn shifted(self, step: isize) -> Self {
        let index = Self::ALL.iter().position(|f| *f == self).unwrap_or(0) as isize;
        let len = Self::ALL.len() as isize;
        Self::ALL[(index + step).rem_euclid(len) as usize]
    }
}

/// Title search (case-insensitive substring) first, then the status filter.
pub fn filter_tasks<'a>(tasks: &'a [Task], query: &str, filter: StatusFilter) -> Vec<&'a Task> {
    let query = query.to_lowercase();
    tasks
        .iter()
        .filter(|task| task.title.to_lowercase().contains(&query))
        .filter(|task| filter.admits(task))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Title,
    DueDate,
}

/// Create/edit form. The due date is typed as YYYY-MM-DD.
#[derive(Debug, Default, Clone)]
pub struct TaskForm {
    pub title: TextInput,
    pub due_date: TextInput,
    pub field: FormField,
}

impl TaskForm {
    fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::DueDate,
            FormField::DueDate => FormField::Title,
        };
    }

    pub fn edit(&mut self, key: &KeyEvent) -> bool {
        match self.field {
            FormField::Title => self.title.handle_key(key),
            FormField::DueDate => self.due_date.handle_key(key),
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.title.is_blank() || self.due_date.is_blank() {
            return Err("Title and due date are required");
        }
        NaiveDate::parse_from_str(self.due_date.value().trim(), "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| "Due date must be YYYY-MM-DD")
    }

    fn body(&self, complete: bool) -> TaskBody {
        TaskBody {
            title: self.title.value().trim().to_string(),
            due_date: to_day_first(self.due_date.value().trim()),
            complete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Modal {
    #[default]
    None,
    Create,
    Edit(String),
    Delete(String),
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    List,
    Search,
}

/// A local change applied ahead of the server, with what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { provisional_id: String },
    Edit { previous: Task },
    Toggle { id: String, previous: bool },
    Delete { task: Task, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch,
    Create {
        body: TaskBody,
        mutation: Mutation,
    },
    Update {
        id: String,
        body: TaskBody,
        mutation: Mutation,
    },
    Delete {
        id: String,
        mutation: Mutation,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify(Toast),
    Call(RemoteCall),
    SignOut,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    pub tasks: Vec<Task>,
    pub form: TaskForm,
    pub search: TextInput,
    pub filter: StatusFilter,
    pub modal: Modal,
    pub focus: Focus,
    pub selected: usize,
    pub loading: bool,
    pub loading_task: Option<String>,
    pub user: Option<Claims>,
    writes_in_flight: usize,
    provisional_seq: u32,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, user: Claims) -> RemoteCall {
        self.user = Some(user);
        self.loading = true;
        RemoteCall::Fetch
    }

    /// A fetch or a create/edit/delete is still waiting on the server.
    pub fn is_loading(&self) -> bool {
        self.loading || self.writes_in_flight > 0
    }

    /// Rows that cannot be changed right now: the one being toggled and any
    /// created locally that the server has not assigned an id to yet.
    pub fn is_busy(&self, task: &Task) -> bool {
        task.id.starts_with(PROVISIONAL_PREFIX)
            || self.loading_task.as_deref() == Some(task.id.as_str())
    }

    /// The selected row, unless it is busy.
    fn editable_task(&self) -> Option<&Task> {
        self.selected_task().filter(|task| !self.is_busy(task))
    }

    pub fn filtered(&self) -> Vec<&Task> {
        filter_tasks(&self.tasks, self.search.value(), self.filter)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.filtered().get(self.selected).copied()
    }

    pub fn select_next(&mut self) {
        let len = self.filtered().len();
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.filtered().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub fn cycle_filter(&mut self, forward: bool) {
        self.filter = self.filter.shifted(if forward { 1 } else { -1 });
        self.selected = 0;
    }

    pub fn edit_search(&mut self, key: &KeyEvent) {
        if self.search.handle_key(key) {
            self.selected = 0;
        }
    }

    pub fn open_create(&mut self) {
        self.form.reset();
        self.modal = Modal::Create;
    }

    pub fn open_edit(&mut self) {
        let Some((id, form)) = self.editable_task().map(|task| {
            let form = TaskForm {
                title: TextInput::with_value(task.title.clone()),
                due_date: TextInput::with_value(to_year_first(&task.due_date)),
                field: FormField::Title,
            };
            (task.id.clone(), form)
        }) else {
            return;
        };
        self.modal = Modal::Edit(id);
        self.form = form;
    }

    pub fn open_delete(&mut self) {
        if let Some(id) = self.editable_task().map(|t| t.id.clone()) {
            self.modal = Modal::Delete(id);
        }
    }

    pub fn open_logout(&mut self) {
        self.modal = Modal::Logout;
    }

    pub fn close_modal(&mut self) {
        if matches!(self.modal, Modal::Create | Modal::Edit(_)) {
            self.form.reset();
        }
        self.modal = Modal::None;
    }

    /// Submits whichever form modal is open.
    pub fn submit_form(&mut self) -> Option<Effect> {
        match self.modal.clone() {
            Modal::Create => Some(self.submit_create()),
            Modal::Edit(id) => Some(self.submit_edit(&id)),
            _ => None,
        }
    }

    fn submit_create(&mut self) -> Effect {
        if let Err(message) = self.form.validate() {
            return Effect::Notify(Toast::error(message));
        }
        let body = self.form.body(false);
        self.provisional_seq += 1;
        let provisional_id = format!("{PROVISIONAL_PREFIX}{}", self.provisional_seq);
        self.tasks.push(Task {
            id: provisional_id.clone(),
            title: body.title.clone(),
            due_date: body.due_date.clone(),
            complete: false,
        });
        self.form.reset();
        self.modal = Modal::None;
        self.writes_in_flight += 1;
        debug!(%provisional_id, "task created locally");
        Effect::Call(RemoteCall::Create {
            body,
            mutation: Mutation::Create { provisional_id },
        })
    }

    fn submit_edit(&mut self, id: &str) -> Effect {
        if let Err(message) = self.form.validate() {
            return Effect::Notify(Toast::error(message));
        }
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            self.close_modal();
            return Effect::Notify(Toast::error("Failed to update task"));
        };
        let task = &mut self.tasks[index];
        let previous = task.clone();
        let body = self.form.body(task.complete);
        task.title = body.title.clone();
        task.due_date = body.due_date.clone();

        self.form.reset();
        self.modal = Modal::None;
        self.writes_in_flight += 1;
        Effect::Call(RemoteCall::Update {
            id: id.to_string(),
            body,
            mutation: Mutation::Edit { previous },
        })
    }

    /// Flips the selected task right away; the server is told afterwards.
    pub fn toggle_selected(&mut self) -> Option<Effect> {
        let id = self.editable_task()?.id.clone();
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        let previous = task.complete;
        task.complete = !previous;
        let body = TaskBody::from(&*task);
        self.loading_task = Some(id.clone());
        self.clamp_selection();
        Some(Effect::Call(RemoteCall::Update {
            id: id.clone(),
            body,
            mutation: Mutation::Toggle { id, previous },
        }))
    }

    pub fn confirm_delete(&mut self) -> Option<Effect> {
        let Modal::Delete(id) = &self.modal else {
            return None;
        };
        let id = id.clone();
        self.modal = Modal::None;
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);
        self.writes_in_flight += 1;
        self.clamp_selection();
        Some(Effect::Call(RemoteCall::Delete {
            id,
            mutation: Mutation::Delete { task, index },
        }))
    }

    pub fn confirm_logout(&mut self) -> Effect {
        self.modal = Modal::None;
        info!("user signed out");
        Effect::SignOut
    }

    pub fn apply_fetch(&mut self, outcome: Outcome<Vec<Task>>) -> Toast {
        self.loading = false;
        match outcome {
            Ok(reply) => {
                debug!(count = reply.data.len(), "task list replaced");
                self.tasks = reply.data;
                self.clamp_selection();
                Toast::success(reply.message)
            }
            Err(failure) => Toast::error(failure.message),
        }
    }

    /// Settles a mutation: refetch on success, undo on failure.
    pub fn apply_mutation(
        &mut self,
        mutation: Mutation,
        outcome: Outcome<()>,
    ) -> (Toast, Option<RemoteCall>) {
        if let Mutation::Toggle { id, .. } = &mutation {
            if self.loading_task.as_deref() == Some(id.as_str()) {
                self.loading_task = None;
            }
        } else {
            self.writes_in_flight = self.writes_in_flight.saturating_sub(1);
        }
        match outcome {
            Ok(reply) => (Toast::success(reply.message), Some(RemoteCall::Fetch)),
            Err(failure) => {
                info!(?mutation, error = %failure.error, "rolling back local change");
                self.roll_back(mutation);
                (Toast::error(failure.message), None)
            }
        }
    }

    fn roll_back(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::Create { provisional_id } => {
                self.tasks.retain(|t| t.id != provisional_id);
            }
            Mutation::Edit { previous } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == previous.id) {
                    *task = previous;
                }
            }
            Mutation::Toggle { id, previous } => {
                if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                    task.complete = previous;
                }
            }
            Mutation::Delete { task, index } => {
                if !self.tasks.iter().any(|t| t.id == task.id) {
                    let index = index.min(self.tasks.len());
                    self.tasks.insert(index, task);
                }
            }
        }
        self.clamp_selection();
    }
}
