mod error;

use std::io::{self, BufRead};

use argh::FromArgs;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};

pub use error::Error;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "argon",
    description = "Hash a password for an [auth.identity] entry"
)]
pub struct Options {
    /// read the password from the first line of stdin instead of prompting
    #[argh(switch)]
    stdin: bool,
}

pub struct Command;

impl Command {
    pub fn run(options: &Options) -> Result<(), Error> {
        let password = if options.stdin {
            read_password(io::stdin().lock())?
        } else {
            let password = rpassword::prompt_password("Password: ")?;
            let confirmation = rpassword::prompt_password("Confirm password: ")?;
            if password != confirmation {
                return Err(Error::Input("Passwords do not match".to_string()));
            }
            password
        };

        println!("{}", hash_password(&password)?);
        Ok(())
    }
}

fn read_password<R: BufRead>(mut reader: R) -> Result<String, Error> {
    let mut line = String::new();
    reader.read_line(&mut line)?;

    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(Error::Input("Empty password".to_string()));
    }

    Ok(password.to_string())
}

/// PHC string accepted by the credential store
fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(OsRng);
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());

    Ok(argon.hash_password(password.as_bytes(), &salt)?.to_string())
}
