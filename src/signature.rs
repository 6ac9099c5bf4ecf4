//! Rewrites class names inside field/method descriptors and generic signatures.
//!
//! Descriptors are a subset of the signature grammar (JVMS 4.7.9.1), so one recursive
//! parser serves both. Only the binary name of each `L...;` outer class is handed to the
//! remapper. Type variables, primitives and inner-class suffixes (`.Inner`) are copied
//! as they are.

use crate::classfile::Remapper;
use crate::error::{Result, malformed_error};

/// Rewrites a descriptor such as `(Lcom/acme/Widget;I)V`. `None` means unchanged.
pub fn map_descriptor(descriptor: &str, remapper: &mut dyn Remapper) -> Result<Option<String>> {
    SignatureMapper::new(descriptor, remapper).run()
}

/// Rewrites a class, method or field signature. `None` means unchanged.
pub fn map_signature(signature: &str, remapper: &mut dyn Remapper) -> Result<Option<String>> {
    SignatureMapper::new(signature, remapper).run()
}

struct SignatureMapper<'a, 'r> {
    src: &'a str,
    pos: usize,
    out: String,
    changed: bool,
    remapper: &'r mut dyn Remapper,
}

impl<'a, 'r> SignatureMapper<'a, 'r> {
    fn new(src: &'a str, remapper: &'r mut dyn Remapper) -> Self {
        Self {
            src,
            pos: 0,
            out: String::with_capacity(src.len() + 16),
            changed: false,
            remapper,
        }
    }

    fn run(mut self) -> Result<Option<String>> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.copy(1);
            while self.peek() != Some(b')') {
                self.type_signature()?;
            }
            self.copy(1);
            self.type_signature()?;
            while self.peek() == Some(b'^') {
                self.copy(1);
                self.type_signature()?;
            }
        } else {
            // field type, or superclass followed by interfaces
            while self.pos < self.src.len() {
                self.type_signature()?;
            }
        }
        if self.pos != self.src.len() {
            return Err(malformed_error!(
                "trailing data at {} in signature {:?}",
                self.pos,
                self.src
            ));
        }
        Ok(self.changed.then_some(self.out))
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    // Only ever called on ASCII delimiters, so the slice stays on char boundaries.
    fn copy(&mut self, n: usize) {
        let end = (self.pos + n).min(self.src.len());
        self.out.push_str(&self.src[self.pos..end]);
        self.pos = end;
    }

    fn find(&self, stops: &[u8]) -> Result<usize> {
        self.src.as_bytes()[self.pos..]
            .iter()
            .position(|b| stops.contains(b))
            .map(|offset| self.pos + offset)
            .ok_or_else(|| malformed_error!("unterminated name in signature {:?}", self.src))
    }

    fn type_parameters(&mut self) -> Result<()> {
        self.copy(1);
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.copy(1);
                    return Ok(());
                }
                Some(_) => {
                    let colon = self.find(b":")?;
                    self.copy(colon + 1 - self.pos);
                    if !matches!(self.peek(), Some(b':' | b'>')) {
                        self.type_signature()?;
                    }
                    while self.peek() == Some(b':') {
                        self.copy(1);
                        self.type_signature()?;
                    }
                }
                None => return Err(malformed_error!("unterminated type parameters in {:?}", self.src)),
            }
        }
    }

    fn type_signature(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
                self.copy(1);
                Ok(())
            }
            Some(b'[') => {
                self.copy(1);
                self.type_signature()
            }
            Some(b'T') => {
                let end = self.find(b";")?;
                self.copy(end + 1 - self.pos);
                Ok(())
            }
            Some(b'L') => self.class_type(),
            Some(other) => Err(malformed_error!(
                "unexpected {:?} at {} in signature {:?}",
                other as char,
                self.pos,
                self.src
            )),
            None => Err(malformed_error!("truncated signature {:?}", self.src)),
        }
    }

    fn class_type(&mut self) -> Result<()> {
        self.copy(1);
        let end = self.find(b"<;.")?;
        let src = self.src;
        let name = &src[self.pos..end];
        self.pos = end;
        match self.remapper.map(name) {
            Some(mapped) if mapped != name => {
                self.changed = true;
                self.out.push_str(&mapped);
            }
            _ => self.out.push_str(name),
        }

        loop {
            match self.peek() {
                Some(b'<') => self.type_arguments()?,
                Some(b'.') => {
                    self.copy(1);
                    let end = self.find(b"<;.")?;
                    self.copy(end - self.pos);
                }
                Some(b';') => {
                    self.copy(1);
                    return Ok(());
                }
                _ => return Err(malformed_error!("unterminated class type in {:?}", self.src)),
            }
        }
    }

    fn type_arguments(&mut self) -> Result<()> {
        self.copy(1);
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.copy(1);
                    return Ok(());
                }
                Some(b'*') => self.copy(1),
                Some(b'+' | b'-') => {
                    self.copy(1);
                    self.type_signature()?;
                }
                Some(_) => self.type_signature()?,
                None => return Err(malformed_error!("unterminated type arguments in {:?}", self.src)),
            }
        }
    }
}
