pub mod transcript;
pub mod user;

pub use transcript::TranscriptsRepository;
pub use user::UsersRepository;
