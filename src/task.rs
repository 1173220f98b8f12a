use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(rename = "dueDate", default)]
    pub due_date: String, // DD-MM-YYYY
    #[serde(default)]
    pub complete: bool,
}

/// Request body for creating or replacing a task.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub title: String,
    pub due_date: String,
    pub complete: bool,
}

impl From<&Task> for TaskBody {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            due_date: task.due_date.clone(),
            complete: task.complete,
        }
    }
}

/// `YYYY-MM-DD` to `DD-MM-YYYY`. Text that is not three `-` separated parts
/// comes back unchanged.
pub fn to_day_first(date: &str) -> String {
    reverse_parts(date)
}

/// `DD-MM-YYYY` to `YYYY-MM-DD`.
pub fn to_year_first(date: &str) -> String {
    reverse_parts(date)
}

fn reverse_parts(date: &str) -> String {
    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [a, b, c] => format!("{c}-{b}-{a}"),
        _ => date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_between_date_orders() {
        assert_eq!(to_day_first("2024-05-01"), "01-05-2024");
        assert_eq!(to_year_first("01-05-2024"), "2024-05-01");
        assert_eq!(to_year_first(&to_day_first("2024-05-01")), "2024-05-01");
    }

    #[test]
    fn odd_dates_pass_through() {
        assert_eq!(to_day_first(""), "");
        assert_eq!(to_day_first("tomorrow"), "tomorrow");
        assert_eq!(to_year_first("1-2-3-4"), "1-2-3-4");
    }

    #[test]
    fn task_wire_format() {
        let task: Task = serde_json::from_str(
            r#"{"_id":"t1","title":"Buy milk","dueDate":"01-05-2024","complete":true,"__v":0}"#,
        )
        .unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.due_date, "01-05-2024");
        assert!(task.complete);

        let body = serde_json::to_value(TaskBody::from(&task)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"title":"Buy milk","dueDate":"01-05-2024","complete":true})
        );
    }

    #[test]
    fn plain_id_is_accepted() {
        let task: Task = serde_json::from_str(r#"{"id":"t2","title":"x"}"#).unwrap();
        assert_eq!(task.id, "t2");
        assert!(!task.complete);
    }
}
