mod devices;
mod login;
mod logout;
mod output;
mod profile;
mod request;
mod token;

pub use devices::Devices;
pub use login::Login;
pub use logout::Logout;
pub use output::FormaOutput;
pub use profile::Profile;
pub use request::Request;
pub use token::Token;
