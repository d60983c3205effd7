pub mod clock;
pub mod db;
pub mod memory;
pub mod timer_store;

pub use clock::SystemClock;
pub use db::DbAdapter;
pub use memory::InMemoryDatabase;
pub use timer_store::FileTimerStorage;
