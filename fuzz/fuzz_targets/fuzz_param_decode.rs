//! Fuzz target: `Parameters::decode` for every record type.
//!
//! Arbitrary bytes must either decode or yield a typed `ConfigError`, and
//! anything that decodes must re-encode to a record that decodes again.
//!
//! cargo fuzz run fuzz_param_decode

#![no_main]

use labrig::config::{
    AnalogParams, BrakeParams, EncoderParams, LickParams, Parameters, ScreenParams,
    SpeakerParams, TorqueParams, TtlParams, ValveParams,
};
use libfuzzer_sys::fuzz_target;

fn check<P: Parameters>(data: &[u8]) {
    if let Ok(params) = P::decode(data) {
        assert_eq!(data.len(), P::WIRE_SIZE);
        let bytes = params.encode();
        // Booleans normalise to 0/1, so only the length is guaranteed.
        assert_eq!(bytes.len(), P::WIRE_SIZE);
        assert!(P::decode(&bytes).is_ok(), "re-encoded record must decode");
    }
}

fuzz_target!(|data: &[u8]| {
    check::<ValveParams>(data);
    check::<TtlParams>(data);
    check::<BrakeParams>(data);
    check::<SpeakerParams>(data);
    check::<ScreenParams>(data);
    check::<LickParams>(data);
    check::<AnalogParams>(data);
    check::<TorqueParams>(data);
    check::<EncoderParams>(data);
});
