#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not. A config
    // that validates must also convert into the runtime structs.
    if let Ok(cfg) = cane_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        let _ = cane_core::SessionCfg::from(&cfg);
    }
});
