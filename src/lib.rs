//! Callback-style client for the HabitRPG REST API on top of reqwest, with an
//! in-memory mock transport for fully deterministic tests.

pub mod adapter;
pub mod client;
pub mod config;
pub mod habitrpg;
pub mod mock;
pub mod resource;

pub use reqwest::Method;

pub use adapter::{
    ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest, RestResponse,
    RestResult, RestTransport, RestTransportState,
};
pub use client::{Cancellable, HeaderSet, RestClient};
pub use config::{AuthenticationInfo, ClientError, DEFAULT_BASE_URL, HabitRpgConfig};
pub use habitrpg::HabitRpgClient;
pub use mock::{
    MockBehavior, MockBehaviorPlan, MockResponse, MockRestAdapter, MockRestStateSnapshot,
};
pub use resource::{
    ChecklistItem, NewTask, Profile, ScoreDirection, ScoreResult, ServerStatus, Stats, Task,
    TaskType, TaskUpdate, User,
};
