// Domain 層：核心模型與 ports（介面）

pub mod model;
pub mod ports;
