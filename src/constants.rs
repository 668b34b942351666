// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: &str = "5000";
pub const DEFAULT_DATA_PATH: &str = "data";
pub const DEFAULT_LOG_FILTER: &str = "money_manager_server=info,tower_http=info";
pub const DATABASE_FILE: &str = "money_manager.db";

// Session configuration
pub const SESSION_NAME: &str = "axum_session";
pub const SESSION_EXPIRY_DAYS: i64 = 7;
pub const SESSION_USER_KEY: &str = "user";
pub const MIN_SESSION_SECRET_LENGTH: usize = 64;

// Query limits and defaults
pub const DEFAULT_EXPENSES_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;

// Validation limits
pub const MAX_CATEGORY_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_SETTING_KEY_LENGTH: usize = 64;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// Upper bound for a single amount, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

// Settings keys and their seeded defaults
pub const SETTING_MONTHLY_BUDGET: &str = "monthly_budget";
pub const SETTING_CURRENCY: &str = "currency";
pub const SETTING_DEFAULT_CATEGORY: &str = "default_category";
pub const SETTING_CUSTOM_CATEGORIES: &str = "custom_categories";
pub const DEFAULT_MONTHLY_BUDGET: &str = "1000";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_CATEGORY: &str = "Others";
pub const DEFAULT_SETTINGS: [(&str, &str); 3] = [
    (SETTING_MONTHLY_BUDGET, DEFAULT_MONTHLY_BUDGET),
    (SETTING_CURRENCY, DEFAULT_CURRENCY),
    (SETTING_DEFAULT_CATEGORY, DEFAULT_CATEGORY),
];

// Response messages
pub const MSG_HEALTH: &str = "Money Manager API is running";
pub const MSG_REGISTERED: &str = "User registered successfully";
pub const MSG_LOGGED_IN: &str = "Login successful";
pub const MSG_EXPENSE_DELETED: &str = "Expense deleted successfully";
pub const MSG_SETTINGS_UPDATED: &str = "Settings updated successfully";

// Error messages
pub const ERR_INTERNAL: &str = "Internal server error";
pub const ERR_UNAUTHORIZED: &str = "Not logged in";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const ERR_EXPENSE_NOT_FOUND: &str = "Expense not found";
pub const ERR_ROUTE_NOT_FOUND: &str = "Route not found";
pub const ERR_EMAIL_TAKEN: &str = "User with this email already exists";
