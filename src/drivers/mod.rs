//! Actuator drivers and the lock-respecting output primitive they share.
//!
//! | Driver    | Commands                                   | Output          |
//! |-----------|--------------------------------------------|-----------------|
//! | `valve`   | Pulse, ToggleOn/Off, Calibrate, Tone       | GPIO (+ tone)   |
//! | `ttl`     | Pulse, ToggleOn/Off, CheckState            | GPIO in or out  |
//! | `brake`   | ToggleOn/Off, SetBreakingPower             | PWM             |
//! | `speaker` | Pulse, ToggleOn/Off                        | GPIO            |
//! | `screen`  | Toggle                                     | 3 × GPIO relays |

pub mod brake;
pub mod output;
pub mod screen;
pub mod speaker;
pub mod ttl;
pub mod valve;

pub use brake::Brake;
pub use output::{Actuator, Polarity};
pub use screen::Screen;
pub use speaker::Speaker;
pub use ttl::Ttl;
pub use valve::Valve;
