//! Data models for departments and users

mod department;
mod page;
mod user;

pub use department::{Department, DepartmentPatch, NewDepartment, RemoteDepartment};
pub use page::Page;
pub use user::{DEFAULT_LANGUAGE, DEFAULT_TIMEZONE, NewUser, RemoteUser, User, UserName, UserPatch};
