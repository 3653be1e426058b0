//=============================================
// solvra_lua/libs.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Capability flags for the embedded interpreter
// Objective: Decide which standard library subsets a fresh instance opens
//=============================================

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use mlua::StdLib;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Independently combinable set of standard library capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Libs(u16);

impl Libs {
    pub const NONE: Libs = Libs(0);
    pub const BASE: Libs = Libs(1 << 0);
    pub const IO: Libs = Libs(1 << 1);
    pub const MATH: Libs = Libs(1 << 2);
    pub const PACKAGE: Libs = Libs(1 << 3);
    pub const STRING: Libs = Libs(1 << 4);
    pub const TABLE: Libs = Libs(1 << 5);
    pub const OS: Libs = Libs(1 << 6);
    pub const COROUTINE: Libs = Libs(1 << 7);
    pub const UTF8: Libs = Libs(1 << 8);
    pub const ALL: Libs = Libs((1 << 9) - 1);

    const NAMED: [(&'static str, Libs); 9] = [
        ("base", Libs::BASE),
        ("io", Libs::IO),
        ("math", Libs::MATH),
        ("package", Libs::PACKAGE),
        ("string", Libs::STRING),
        ("table", Libs::TABLE),
        ("os", Libs::OS),
        ("coroutine", Libs::COROUTINE),
        ("utf8", Libs::UTF8),
    ];

    pub fn contains(self, other: Libs) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, lib)| self.contains(*lib))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Interpreter libraries to open. The base library is always loaded by the
    /// interpreter and stripped afterwards when not requested.
    pub(crate) fn std_lib(self) -> StdLib {
        let mut std_lib = StdLib::NONE;
        for (lib, flag) in [
            (Libs::IO, StdLib::IO),
            (Libs::MATH, StdLib::MATH),
            (Libs::PACKAGE, StdLib::PACKAGE),
            (Libs::STRING, StdLib::STRING),
            (Libs::TABLE, StdLib::TABLE),
            (Libs::OS, StdLib::OS),
            (Libs::COROUTINE, StdLib::COROUTINE),
            (Libs::UTF8, StdLib::UTF8),
        ] {
            if self.contains(lib) {
                std_lib = std_lib | flag;
            }
        }
        std_lib
    }

    /// Globals that survive base stripping: the tables of requested libraries.
    pub(crate) fn retained_globals(self) -> Vec<&'static str> {
        let mut globals: Vec<&'static str> = self
            .names()
            .into_iter()
            .filter(|name| *name != "base")
            .collect();
        if self.contains(Libs::PACKAGE) {
            globals.push("require");
        }
        globals
    }
}

impl Default for Libs {
    fn default() -> Self {
        Libs::ALL
    }
}

impl BitOr for Libs {
    type Output = Libs;

    fn bitor(self, rhs: Libs) -> Libs {
        Libs(self.0 | rhs.0)
    }
}

impl BitOrAssign for Libs {
    fn bitor_assign(&mut self, rhs: Libs) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Libs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Libs::ALL {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join(","))
    }
}

impl FromStr for Libs {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut libs = Libs::NONE;
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            libs |= parse_one(part)?;
        }
        Ok(libs)
    }
}

fn parse_one(name: &str) -> Result<Libs, Error> {
    let lowered = name.to_ascii_lowercase();
    match lowered.as_str() {
        "all" => Ok(Libs::ALL),
        "none" => Ok(Libs::NONE),
        other => Libs::NAMED
            .iter()
            .find(|(known, _)| *known == other)
            .map(|(_, lib)| *lib)
            .ok_or_else(|| Error::Config(format!("unknown library '{name}'"))),
    }
}

impl TryFrom<Vec<String>> for Libs {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names
            .iter()
            .try_fold(Libs::NONE, |acc, name| Ok(acc | parse_one(name)?))
    }
}

impl From<Libs> for Vec<String> {
    fn from(libs: Libs) -> Self {
        if libs == Libs::ALL {
            return vec!["all".to_string()];
        }
        libs.names().into_iter().map(str::to_string).collect()
    }
}
