pub mod category;
pub mod task;
pub mod user;

pub use category::{Category, CategoryInput, NewCategory};
pub use task::{
    NewTask, Task, TaskChanges, TaskFilter, TaskInput, TaskPriority, TaskQuery, TaskStatus,
    TaskUpdate,
};
pub use user::{LoginRequest, NewUser, RefreshRequest, RegisterRequest, User};
