//! Reminder selection and timing.
//!
//! Pure task-list arithmetic behind the e-mail reminder jobs: which tasks
//! are due, which are overdue, and whether "now" falls inside a send window.
//! Transport and scheduling live outside this crate.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::models::Task;

/// Overdue reminders only fire once a deadline is at least this far gone.
const OVERDUE_GRACE_MINUTES: i64 = 60;

/// Send windows tolerate this much lateness from the scheduler.
const SEND_TOLERANCE_MINUTES: u32 = 15;

fn task_date(task: &Task) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&task.date, "%Y-%m-%d").ok()
}

fn task_time(task: &Task) -> Option<NaiveTime> {
    if task.is_full_day || task.time.is_empty() {
        return None;
    }
    NaiveTime::parse_from_str(&task.time, "%H:%M").ok()
}

/// Moment a task turns overdue: its time on its date, or end of day for
/// full-day and untimed tasks.
fn deadline(task: &Task) -> Option<NaiveDateTime> {
    let date = task_date(task)?;
    match task_time(task) {
        Some(time) => Some(date.and_time(time)),
        None => date.and_hms_opt(23, 59, 59),
    }
}

/// Incomplete tasks dated exactly `date`.
pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| !t.completed && task_date(t) == Some(date))
        .collect()
}

/// Incomplete tasks whose deadline has passed.
pub fn overdue_tasks(tasks: &[Task], now: NaiveDateTime) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| !t.completed && deadline(t).is_some_and(|d| d < now))
        .collect()
}

/// Incomplete tasks dated within `[today, today + days]`, soonest first.
pub fn upcoming_tasks(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<&Task> {
    let horizon = today + chrono::Duration::days(days as i64);
    let mut upcoming: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            !t.completed
                && task_date(t).is_some_and(|d| d >= today && d <= horizon)
        })
        .collect();
    upcoming.sort_by(|a, b| (&a.date, a.effective_time()).cmp(&(&b.date, b.effective_time())));
    upcoming
}

/// Whether the daily reminder for today's tasks should go out now.
///
/// One hour before the earliest timed task, with a 15-minute tolerance on
/// either side of the hour mark; 08:00 when every task is full-day/untimed.
pub fn should_send_daily(tasks_today: &[&Task], now: NaiveDateTime) -> bool {
    if tasks_today.is_empty() {
        return false;
    }

    let mut times: Vec<NaiveTime> = tasks_today.iter().filter_map(|t| task_time(t)).collect();
    times.sort();

    match times.first() {
        Some(first) => {
            let notification_hour = first.hour() as i32 - 1;
            let hour = now.hour() as i32;
            let minute = now.minute();
            (hour == notification_hour && minute <= SEND_TOLERANCE_MINUTES)
                || (hour == notification_hour + 1 && minute <= SEND_TOLERANCE_MINUTES)
        }
        None => now.hour() == 8 && now.minute() <= SEND_TOLERANCE_MINUTES,
    }
}

/// Whether an overdue reminder should go out: some task has been overdue
/// for more than an hour.
pub fn should_send_overdue(tasks: &[&Task], now: NaiveDateTime) -> bool {
    tasks.iter().any(|t| {
        deadline(t)
            .is_some_and(|d| now - d > chrono::Duration::minutes(OVERDUE_GRACE_MINUTES))
    })
}
