//! Error code registry
//!
//! Maps numeric error codes to human-readable messages and symbolic names.
//! Logging consults this table when a message is given a code by name and
//! when the parseable record needs the code's message text.

use std::collections::BTreeMap;
use std::sync::{OnceLock, PoisonError, RwLock};

/// Lookup contract the logger relies on for error codes
pub trait ErrorCodeResolver: Send + Sync {
    /// Message text for a code, or an empty string if the code is unknown
    fn get(&self, code: i32) -> String;

    /// Numeric code for a symbolic name, or 0 if the name is unknown
    fn get_code(&self, name: &str) -> i32;

    /// Register a new code
    ///
    /// Returns false without changing anything if the code already exists.
    fn add(&self, code: i32, msg: &str, name: Option<&str>) -> bool;
}

/// Built-in error and warning codes: (name, code, message)
const DEFAULT_CODES: &[(&str, i32, &str)] = &[
    // Errors
    ("ModuleIndexOutOfRange", -1, "Allocating module that is out of range or not found"),
    ("ChannelIndexOutOfRange", -1, "Allocating channel that is out of range"),
    ("NotAllocated", -2, "Attempting to free unallocated resource"),
    ("ResourceAlreadyAllocated", -3, "Attempted to reuse an allocated resource"),
    ("NoAvailableResources", -4, "No available resources to allocate"),
    ("NullParameter", -5, "A pointer parameter to a method is nullptr"),
    ("Timeout", -6, "A timeout has been exceeded"),
    ("CompassManufacturerError", -7, "Compass manufacturer doesn't match HiTechnic"),
    ("CompassTypeError", -8, "Compass type doesn't match expected type for HiTechnic compass"),
    ("IncompatibleMode", -9, "The object is in an incompatible mode"),
    ("AnalogTriggerLimitOrderError", -10, "AnalogTrigger limits error.  Lower limit > Upper Limit"),
    ("AnalogTriggerPulseOutputError", -11, "Attempted to read AnalogTrigger pulse output."),
    ("TaskError", -12, "Task can't be started"),
    ("TaskIDError", -13, "Task error: Invalid ID."),
    ("TaskDeletedError", -14, "Task error: Task already deleted."),
    ("TaskOptionsError", -15, "Task error: Invalid options."),
    ("TaskMemoryError", -16, "Task can't be started due to insufficient memory."),
    ("TaskPriorityError", -17, "Task error: Invalid priority [1-255]."),
    ("DriveUninitialized", -18, "RobotDrive not initialized for the C interface"),
    ("CompressorNonMatching", -19, "Compressor slot/channel doesn't match previous instance"),
    ("CompressorAlreadyDefined", -20, "Creating a second compressor instance"),
    ("CompressorUndefined", -21, "Using compressor functions without defining compressor"),
    (
        "InconsistentArrayValueAdded",
        -22,
        "When packing data into an array to the dashboard, not all values added were of the same type.",
    ),
    (
        "MismatchedComplexTypeClose",
        -23,
        "When packing data to the dashboard, a Close for a complex type was called without a matching Open.",
    ),
    (
        "DashboardDataOverflow",
        -24,
        "When packing data to the dashboard, too much data was packed and the buffer overflowed.",
    ),
    ("DashboardDataCollision", -25, "The same buffer was used for packing data and for printing."),
    ("EnhancedIOMissing", -26, "IO is not attached or Enhanced IO is not enabled."),
    ("LineNotOutput", -27, "Cannot SetDigitalOutput for a line not configured for output."),
    ("ParameterOutOfRange", -28, "A parameter is out of range."),
    ("SPIClockRateTooLow", -29, "SPI clock rate was below the minimum supported"),
    ("JaguarVersionError", -30, "Jaguar firmware version error"),
    ("JaguarMessageNotFound", -31, "Jaguar message not found"),
    ("NetworkTablesReadError", -40, "Error reading NetworkTables socket"),
    ("NetworkTablesBufferFull", -41, "Buffer full writing to NetworkTables socket"),
    ("NetworkTablesWrongType", -42, "The wrong type was read from the NetworkTables entry"),
    ("NetworkTablesCorrupt", -43, "NetworkTables data stream is corrupt"),
    ("SmartDashboardMissingKey", -43, "SmartDashboard data does not exist"),
    ("CommandIllegalUse", -50, "Illegal use of Command"),
    ("UnsupportedInSimulation", -80, "Unsupported in simulation"),
    // Warnings
    ("SampleRateTooHigh", 1, "Analog module sample rate is too high"),
    ("VoltageOutOfRange", 2, "Voltage to convert to raw value is out of range [-10; 10]"),
    ("CompressorTaskError", 3, "Compressor task won't start"),
    ("LoopTimingError", 4, "Digital module loop timing is not the expected value"),
    ("NonBinaryDigitalValue", 5, "Digital output value is not 0 or 1"),
    ("IncorrectBatteryChannel", 6, "Battery measurement channel is not correct value"),
    ("BadJoystickIndex", 7, "Joystick index is out of range, should be 0-3"),
    ("BadJoystickAxis", 8, "Joystick axis or POV is out of range"),
    ("InvalidMotorIndex", 9, "Motor index is out of range, should be 0-3"),
    ("DriverStationTaskError", 10, "Driver Station task won't start"),
    (
        "EnhancedIOPWMPeriodOutOfRange",
        11,
        "Driver Station Enhanced IO PWM Output period out of range.",
    ),
    ("SPIWriteNoMOSI", 12, "Cannot write to SPI port with no MOSI output"),
    ("SPIReadNoMISO", 13, "Cannot read from SPI port with no MISO input"),
    ("SPIReadNoData", 14, "No data available to read from SPI"),
    ("IncompatibleState", 15, "Incompatible State: The operation cannot be completed"),
];

#[derive(Debug, Default)]
struct CodeTable {
    messages: BTreeMap<i32, String>,
    names: BTreeMap<String, i32>,
}

/// Thread-safe error code table
#[derive(Debug, Default)]
pub struct ErrorCodes {
    table: RwLock<CodeTable>,
}

/// One row of the code table, for listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: i32,
    pub name: Option<String>,
    pub message: String,
}

static GLOBAL_CODES: OnceLock<ErrorCodes> = OnceLock::new();

impl ErrorCodes {
    /// Create an empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a table seeded with the built-in codes
    pub fn new() -> Self {
        let codes = Self::empty();
        for (name, code, msg) in DEFAULT_CODES {
            codes.add(*code, msg, Some(name));
        }
        codes
    }

    /// Process-wide table, built on first access
    pub fn global() -> &'static ErrorCodes {
        GLOBAL_CODES.get_or_init(ErrorCodes::new)
    }

    /// All registered codes sorted by code
    pub fn entries(&self) -> Vec<CodeEntry> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .messages
            .iter()
            .map(|(code, message)| CodeEntry {
                code: *code,
                name: table
                    .names
                    .iter()
                    .find(|(_, c)| *c == code)
                    .map(|(n, _)| n.clone()),
                message: message.clone(),
            })
            .collect()
    }
}

impl ErrorCodeResolver for ErrorCodes {
    fn get(&self, code: i32) -> String {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.messages.get(&code).cloned().unwrap_or_default()
    }

    fn get_code(&self, name: &str) -> i32 {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.names.get(name).copied().unwrap_or(0)
    }

    fn add(&self, code: i32, msg: &str, name: Option<&str>) -> bool {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.messages.contains_key(&code) {
            return false;
        }
        table.messages.insert(code, msg.to_string());
        if let Some(name) = name {
            table.names.insert(name.to_string(), code);
        }
        true
    }
}

/// Resolver backed by [`ErrorCodes::global`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalErrorCodes;

impl ErrorCodeResolver for GlobalErrorCodes {
    fn get(&self, code: i32) -> String {
        ErrorCodes::global().get(code)
    }

    fn get_code(&self, name: &str) -> i32 {
        ErrorCodes::global().get_code(name)
    }

    fn add(&self, code: i32, msg: &str, name: Option<&str>) -> bool {
        ErrorCodes::global().add(code, msg, name)
    }
}
