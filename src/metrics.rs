use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, CounterVec, HistogramVec,
    IntCounter,
};

lazy_static! {
    // Decision metrics
    pub static ref ADMISSION_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "admission_requests_total",
        "Total number of admission checks",
        &["scope", "allowed"]
    ).unwrap();

    pub static ref ADMISSION_DENIED_TOTAL: CounterVec = register_counter_vec!(
        "admission_denied_total",
        "Total number of denied requests",
        &["scope"]
    ).unwrap();

    // One increment per fail-open event: the only visibility an operator has
    // into enforcement being suspended during a store outage.
    pub static ref FAIL_OPEN_TOTAL: IntCounter = register_int_counter!(
        "admission_fail_open_total",
        "Checks admitted without accounting because the store was unavailable"
    ).unwrap();

    // Store metrics
    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "admission_store_duration_seconds",
        "Bucket store command duration in seconds",
        &["command"],
        vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5]
    ).unwrap();

    pub static ref STORE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "admission_store_errors_total",
        "Total number of bucket store errors",
        &["error_type"]
    ).unwrap();

    pub static ref SCRIPT_EXECUTIONS_TOTAL: CounterVec = register_counter_vec!(
        "admission_script_executions_total",
        "Total number of admission script executions",
        &["result"]
    ).unwrap();

    // Config metrics
    pub static ref CONFIG_RELOADS_TOTAL: CounterVec = register_counter_vec!(
        "admission_config_reloads_total",
        "Total number of quota configuration reloads",
        &["result"]
    ).unwrap();
}

/// Record an admission decision
pub fn record_decision(scope: &str, allowed: bool) {
    let allowed_str = if allowed { "true" } else { "false" };
    ADMISSION_REQUESTS_TOTAL
        .with_label_values(&[scope, allowed_str])
        .inc();

    if !allowed {
        ADMISSION_DENIED_TOTAL.with_label_values(&[scope]).inc();
    }
}

/// Record a fail-open event
pub fn record_fail_open() {
    FAIL_OPEN_TOTAL.inc();
}

/// Record store command duration
pub fn record_store_duration(command: &str, duration_secs: f64) {
    STORE_DURATION
        .with_label_values(&[command])
        .observe(duration_secs);
}

/// Record a store error
pub fn record_store_error(error_type: &str) {
    STORE_ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Record script execution
pub fn record_script_execution(success: bool) {
    let result = if success { "success" } else { "error" };
    SCRIPT_EXECUTIONS_TOTAL.with_label_values(&[result]).inc();
}

/// Record config reload
pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "error" };
    CONFIG_RELOADS_TOTAL.with_label_values(&[result]).inc();
}
