//! Mirrored entity declarations
//!
//! Field sets follow the remote API payloads. Unknown payload keys are
//! ignored on decode; absent optional keys become `None`.

use chrono::{DateTime, NaiveDate, Utc};

use super::Windowed;

entity! {
    /// A person with an account on the remote service.
    User, parent = None;
    {
        email: String = "TEXT NOT NULL",
        first_name: Option<String> = "TEXT",
        last_name: Option<String> = "TEXT",
        #[serde(default)]
        is_admin: bool = "INTEGER NOT NULL",
        #[serde(default)]
        is_contractor: bool = "INTEGER NOT NULL",
        #[serde(default)]
        is_active: bool = "INTEGER NOT NULL",
        timezone: Option<String> = "TEXT",
        telephone: Option<String> = "TEXT",
        department: Option<String> = "TEXT",
        default_hourly_rate: Option<f64> = "REAL",
        cost_rate: Option<f64> = "REAL",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    Client, parent = None;
    {
        name: String = "TEXT NOT NULL",
        #[serde(default)]
        active: bool = "INTEGER NOT NULL",
        currency: Option<String> = "TEXT",
        currency_symbol: Option<String> = "TEXT",
        details: Option<String> = "TEXT",
        highrise_id: Option<i64> = "INTEGER",
        cache_version: Option<i64> = "INTEGER",
        default_invoice_timeframe: Option<String> = "TEXT",
        last_invoice_kind: Option<String> = "TEXT",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    /// A billable project belonging to a client.
    Project, parent = None;
    {
        client_id: i64 = "INTEGER NOT NULL",
        name: String = "TEXT NOT NULL",
        code: Option<String> = "TEXT",
        #[serde(default)]
        active: bool = "INTEGER NOT NULL",
        #[serde(default)]
        billable: bool = "INTEGER NOT NULL",
        bill_by: Option<String> = "TEXT",
        hourly_rate: Option<f64> = "REAL",
        budget: Option<f64> = "REAL",
        budget_by: Option<String> = "TEXT",
        notify_when_over_budget: Option<bool> = "INTEGER",
        over_budget_notification_percentage: Option<f64> = "REAL",
        over_budget_notified_at: Option<NaiveDate> = "TEXT",
        show_budget_to_all: Option<bool> = "INTEGER",
        starts_on: Option<NaiveDate> = "TEXT",
        ends_on: Option<NaiveDate> = "TEXT",
        estimate: Option<f64> = "REAL",
        estimate_by: Option<String> = "TEXT",
        hint_earliest_record_at: Option<NaiveDate> = "TEXT",
        hint_latest_record_at: Option<NaiveDate> = "TEXT",
        notes: Option<String> = "TEXT",
        cost_budget: Option<f64> = "REAL",
        cost_budget_include_expenses: Option<bool> = "INTEGER",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    Task, parent = None;
    {
        name: String = "TEXT NOT NULL",
        #[serde(default)]
        billable_by_default: bool = "INTEGER NOT NULL",
        is_default: Option<bool> = "INTEGER",
        default_hourly_rate: Option<f64> = "REAL",
        #[serde(default)]
        deactivated: bool = "INTEGER NOT NULL",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    /// Links a task to a project, with per-project billing settings.
    TaskAssignment, parent = Some("project_id");
    {
        project_id: i64 = "INTEGER NOT NULL",
        task_id: i64 = "INTEGER NOT NULL",
        #[serde(default)]
        billable: bool = "INTEGER NOT NULL",
        #[serde(default)]
        deactivated: bool = "INTEGER NOT NULL",
        hourly_rate: Option<f64> = "REAL",
        budget: Option<f64> = "REAL",
        estimate: Option<f64> = "REAL",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    Expense, parent = Some("project_id");
    {
        project_id: i64 = "INTEGER NOT NULL",
        user_id: Option<i64> = "INTEGER",
        expense_category_id: Option<i64> = "INTEGER",
        spent_at: NaiveDate = "TEXT NOT NULL",
        total_cost: Option<f64> = "REAL",
        units: Option<f64> = "REAL",
        notes: Option<String> = "TEXT",
        #[serde(default)]
        billable: bool = "INTEGER NOT NULL",
        #[serde(default)]
        is_closed: bool = "INTEGER NOT NULL",
        invoice_id: Option<i64> = "INTEGER",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    Invoice, parent = None;
    {
        client_id: i64 = "INTEGER NOT NULL",
        number: Option<String> = "TEXT",
        period_start: Option<NaiveDate> = "TEXT",
        period_end: Option<NaiveDate> = "TEXT",
        issued_at: Option<NaiveDate> = "TEXT",
        due_at: Option<NaiveDate> = "TEXT",
        amount: Option<f64> = "REAL",
        due_amount: Option<f64> = "REAL",
        currency: Option<String> = "TEXT",
        state: Option<String> = "TEXT",
        notes: Option<String> = "TEXT",
        purchase_order: Option<String> = "TEXT",
        subject: Option<String> = "TEXT",
        tax: Option<f64> = "REAL",
        tax_amount: Option<f64> = "REAL",
        tax2: Option<f64> = "REAL",
        tax2_amount: Option<f64> = "REAL",
        discount: Option<f64> = "REAL",
        discount_amount: Option<f64> = "REAL",
        client_key: Option<String> = "TEXT",
        estimate_id: Option<i64> = "INTEGER",
        retainer_id: Option<i64> = "INTEGER",
        recurring_invoice_id: Option<i64> = "INTEGER",
        created_by_id: Option<i64> = "INTEGER",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

entity! {
    /// A time entry: hours one user spent on one task of a project on one day.
    DayEntry, parent = Some("project_id");
    {
        project_id: i64 = "INTEGER NOT NULL",
        task_id: i64 = "INTEGER NOT NULL",
        user_id: i64 = "INTEGER NOT NULL",
        spent_at: NaiveDate = "TEXT NOT NULL",
        hours: f64 = "REAL NOT NULL",
        notes: Option<String> = "TEXT",
        #[serde(default)]
        is_billed: bool = "INTEGER NOT NULL",
        #[serde(default)]
        is_closed: bool = "INTEGER NOT NULL",
        timer_started_at: Option<DateTime<Utc>> = "TEXT",
        created_at: Option<DateTime<Utc>> = "TEXT",
        updated_at: Option<DateTime<Utc>> = "TEXT",
    }
}

impl Windowed for DayEntry {
    const DATE_COLUMN: &'static str = "spent_at";
}

impl Project {
    /// Minimal project, remaining fields unset.
    pub fn new(id: i64, client_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            client_id,
            name: name.into(),
            code: None,
            active: true,
            billable: false,
            bill_by: None,
            hourly_rate: None,
            budget: None,
            budget_by: None,
            notify_when_over_budget: None,
            over_budget_notification_percentage: None,
            over_budget_notified_at: None,
            show_budget_to_all: None,
            starts_on: None,
            ends_on: None,
            estimate: None,
            estimate_by: None,
            hint_earliest_record_at: None,
            hint_latest_record_at: None,
            notes: None,
            cost_budget: None,
            cost_budget_include_expenses: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl DayEntry {
    /// Time entry with only the required fields set.
    pub fn new(id: i64, project_id: i64, task_id: i64, user_id: i64, spent_at: NaiveDate, hours: f64) -> Self {
        Self {
            id,
            project_id,
            task_id,
            user_id,
            spent_at,
            hours,
            notes: None,
            is_billed: false,
            is_closed: false,
            timer_started_at: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl User {
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            first_name: None,
            last_name: None,
            is_admin: false,
            is_contractor: false,
            is_active: true,
            timezone: None,
            telephone: None,
            department: None,
            default_hourly_rate: None,
            cost_rate: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Client {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            currency: None,
            currency_symbol: None,
            details: None,
            highrise_id: None,
            cache_version: None,
            default_invoice_timeframe: None,
            last_invoice_kind: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Task {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            billable_by_default: false,
            is_default: None,
            default_hourly_rate: None,
            deactivated: false,
            created_at: None,
            updated_at: None,
        }
    }
}

impl TaskAssignment {
    pub fn new(id: i64, project_id: i64, task_id: i64) -> Self {
        Self {
            id,
            project_id,
            task_id,
            billable: false,
            deactivated: false,
            hourly_rate: None,
            budget: None,
            estimate: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Expense {
    pub fn new(id: i64, project_id: i64, spent_at: NaiveDate, total_cost: f64) -> Self {
        Self {
            id,
            project_id,
            user_id: None,
            expense_category_id: None,
            spent_at,
            total_cost: Some(total_cost),
            units: None,
            notes: None,
            billable: false,
            is_closed: false,
            invoice_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Invoice {
    pub fn new(id: i64, client_id: i64, amount: f64) -> Self {
        Self {
            id,
            client_id,
            number: None,
            period_start: None,
            period_end: None,
            issued_at: None,
            due_at: None,
            amount: Some(amount),
            due_amount: None,
            currency: None,
            state: None,
            notes: None,
            purchase_order: None,
            subject: None,
            tax: None,
            tax_amount: None,
            tax2: None,
            tax2_amount: None,
            discount: None,
            discount_amount: None,
            client_key: None,
            estimate_id: None,
            retainer_id: None,
            recurring_invoice_id: None,
            created_by_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}
