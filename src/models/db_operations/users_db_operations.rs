use crate::models::UserAccount;
use crate::workflow::RoleSet;
use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, is_active, last_login_time";

type UserRow = (i32, String, bool, Option<String>);

fn user_row(row: &Row) -> Result<UserRow, RusqliteError> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn with_roles(conn: &Connection, row: UserRow) -> Result<UserAccount, RusqliteError> {
    let (id, username, is_active, last_login_time) = row;
    Ok(UserAccount {
        id,
        username,
        roles: read_user_roles(conn, id)?,
        is_active,
        last_login_time,
    })
}

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

fn replace_roles(conn: &Connection, user_id: i32, roles: &RoleSet) -> Result<(), RusqliteError> {
    conn.execute("DELETE FROM user_roles WHERE user_id = ?1", [user_id])?;
    for role in roles.iter() {
        conn.execute(
            "INSERT INTO user_roles (user_id, role) VALUES (?1, ?2)",
            params![user_id, role.as_str()],
        )?;
    }
    Ok(())
}

/// Creates a user together with its roles. Returns the new user id.
pub fn create_user(
    conn: &Connection,
    username: &str,
    password: &str,
    roles: &RoleSet,
) -> Result<i32, RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
        params![username, hashed_password],
    )?;
    let user_id = tx.last_insert_rowid() as i32;
    replace_roles(&tx, user_id, roles)?;
    tx.commit()?;
    Ok(user_id)
}

/// Role names are read leniently so a role dropped from the code doesn't lock users out.
pub fn read_user_roles(conn: &Connection, user_id: i32) -> Result<RoleSet, RusqliteError> {
    let mut stmt = conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1")?;
    let names = stmt
        .query_map([user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(RoleSet::from_names(names))
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<UserAccount>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let rows = stmt.query_map([], user_row)?.collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|row| with_roles(conn, row)).collect()
}

pub fn read_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<UserAccount>, RusqliteError> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    let row = conn.query_row(&sql, [username], user_row).optional()?;
    row.map(|row| with_roles(conn, row)).transpose()
}

/// Returns the number of users updated (0 when the username is unknown).
pub fn set_user_roles(
    conn: &Connection,
    username: &str,
    roles: &RoleSet,
) -> Result<usize, RusqliteError> {
    let tx = conn.unchecked_transaction()?;
    let user_id: Option<i32> = tx
        .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| row.get(0))
        .optional()?;
    let Some(user_id) = user_id else {
        return Ok(0);
    };
    replace_roles(&tx, user_id, roles)?;
    tx.commit()?;
    Ok(1)
}

pub fn change_password(
    conn: &Connection,
    username: &str,
    new_password: &str,
) -> Result<usize, RusqliteError> {
    let hashed_password =
        hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )
}

pub fn set_user_active(
    conn: &Connection,
    username: &str,
    is_active: bool,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE users SET is_active = ?1 WHERE username = ?2",
        params![is_active, username],
    )
}

/// Checks a login. Suspended accounts never verify.
pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Option<UserAccount> {
    let res: rusqlite::Result<(String, bool)> = conn.query_row(
        "SELECT password_hash, is_active FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    );

    if let Ok((hash, is_active)) = res {
        if is_active && verify(password, &hash).unwrap_or(false) {
            return read_user_by_username(conn, username).ok().flatten();
        }
    }
    None
}

pub fn update_last_login_time(conn: &Connection, username: &str) -> Result<(), RusqliteError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_login_time = ?1 WHERE username = ?2",
        params![now, username],
    )?;
    Ok(())
}
