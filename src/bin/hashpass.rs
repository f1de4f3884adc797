//! Prints an argon2 PHC string for ADMIN_PASSWORD_HASH.

use hospital_booking::auth::hash_password;

fn main() -> anyhow::Result<()> {
    let password = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Usage: hashpass <password>"))?;
    let phc = hash_password(&password).map_err(anyhow::Error::msg)?;
    println!("{phc}");
    Ok(())
}
