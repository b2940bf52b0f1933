use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use log::{info, error};

use crate::error::PortfolioError;

/// Watch-list of symbols, persisted as a JSON array after every change.
pub struct PortfolioStore {
    path: PathBuf,
    symbols: Mutex<BTreeSet<String>>,
}

impl PortfolioStore {
    /// Load the portfolio from `path`. A missing or unreadable file starts
    /// an empty portfolio.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let symbols = if path.exists() {
            match Self::read_symbols(&path) {
                Ok(symbols) => {
                    info!("Loaded {} stocks from {}", symbols.len(), path.display());
                    symbols
                }
                Err(e) => {
                    error!("Failed to load portfolio from {}: {}", path.display(), e);
                    BTreeSet::new()
                }
            }
        } else {
            BTreeSet::new()
        };

        Self {
            path,
            symbols: Mutex::new(symbols),
        }
    }

    fn read_symbols(path: &Path) -> Result<BTreeSet<String>, PortfolioError> {
        let contents = fs::read_to_string(path)?;
        let symbols: Vec<String> = serde_json::from_str(&contents)?;
        Ok(symbols.into_iter().collect())
    }

    fn normalize(symbol: &str) -> Result<String, PortfolioError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(PortfolioError::InvalidSymbol(symbol));
        }
        Ok(symbol)
    }

    fn save(&self, symbols: &BTreeSet<String>) -> Result<(), PortfolioError> {
        let json = serde_json::to_string_pretty(&symbols.iter().collect::<Vec<_>>())?;
        fs::write(&self.path, json)?;
        info!("Saved portfolio to {}", self.path.display());
        Ok(())
    }

    // Save failures are logged only; the in-memory set stays authoritative
    fn mutate(&self, symbol: &str, apply: impl FnOnce(&mut BTreeSet<String>, String) -> bool) -> Result<bool, PortfolioError> {
        let symbol = Self::normalize(symbol)?;
        let mut symbols = self.symbols.lock().unwrap_or_else(PoisonError::into_inner);

        let changed = apply(&mut symbols, symbol);
        if changed {
            if let Err(e) = self.save(&symbols) {
                error!("Failed to save portfolio: {}", e);
            }
        }
        Ok(changed)
    }

    /// Returns whether the symbol was newly added.
    pub fn add(&self, symbol: &str) -> Result<bool, PortfolioError> {
        self.mutate(symbol, |symbols, symbol| symbols.insert(symbol))
    }

    /// Returns whether the symbol was present.
    pub fn remove(&self, symbol: &str) -> Result<bool, PortfolioError> {
        self.mutate(symbol, |symbols, symbol| symbols.remove(&symbol))
    }

    pub fn list(&self) -> Vec<String> {
        self.symbols
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
