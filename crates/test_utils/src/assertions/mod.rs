//! Assertion utilities for testing

/// Assert that a result is Ok and unwrap it
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok, got Err: {:?}", err),
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("Expected Ok, got Err: {:?} ({})", err, format!($($arg)+)),
        }
    };
}

/// Assert that a result is Err and unwrap the error
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(val) => panic!("Expected Err, got Ok: {:?}", val),
            Err(err) => err,
        }
    };
}

/// Assert that a chain error carries the given stable error code
#[macro_export]
macro_rules! assert_error_code {
    ($result:expr, $code:expr) => {{
        use poc_types::error::ErrorCode as _;
        match $result {
            Ok(val) => panic!("Expected error {}, got Ok: {:?}", $code, val),
            Err(err) => assert_eq!(err.code(), $code, "unexpected error: {}", err),
        }
    }};
}
