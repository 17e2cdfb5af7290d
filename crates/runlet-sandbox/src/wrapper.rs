//! The generated Node.js wrapper program.
//!
//! The wrapper runs inside the child, not the host: it shims the five
//! console writers before the user module loads, so every diagnostic call
//! is captured in order, then emits exactly one framed JSON result using
//! the writers it saved before shimming. Success goes to stdout, failure
//! to stderr with a non-zero exit.

use crate::workspace::{INPUT_FILE, USER_CODE_FILE};

/// Source of the wrapper program written into each workspace.
pub fn wrapper_source() -> String {
    WRAPPER_TEMPLATE
        .replace("__USER_CODE_FILE__", USER_CODE_FILE)
        .replace("__INPUT_FILE__", INPUT_FILE)
}

const WRAPPER_TEMPLATE: &str = r##"'use strict';

const fs = require('fs');
const path = require('path');

const USER_CODE = path.join(__dirname, '__USER_CODE_FILE__');
const INPUT_FILE = path.join(__dirname, '__INPUT_FILE__');

const writeStdout = process.stdout.write.bind(process.stdout);
const writeStderr = process.stderr.write.bind(process.stderr);

const captured = [];

function stringify(value) {
  if (value === undefined) return 'undefined';
  if (value === null) return 'null';
  if (typeof value === 'string') return value;
  if (value instanceof Error) return value.message;
  try {
    return JSON.stringify(value);
  } catch (err) {
    return '[Circular]';
  }
}

for (const level of ['log', 'info', 'warn', 'error', 'debug']) {
  console[level] = (...args) => {
    captured.push({
      type: level,
      message: args.map(stringify).join(' '),
      timestamp: new Date().toISOString(),
    });
  };
}

async function main() {
  const userModule = require(USER_CODE);
  const entrypoint =
    userModule && typeof userModule.default === 'function'
      ? userModule.default
      : userModule;
  if (typeof entrypoint !== 'function') {
    throw new Error('User code must export a function');
  }
  const items = JSON.parse(fs.readFileSync(INPUT_FILE, 'utf8'));
  const data = await entrypoint(items);
  writeStdout(
    JSON.stringify({
      success: true,
      data: data === undefined ? null : data,
      console: captured,
    }) + '\n'
  );
}

main().catch((err) => {
  writeStderr(
    JSON.stringify({
      success: false,
      error: err && err.message ? err.message : String(err),
      stack: err && err.stack ? err.stack : undefined,
      console: captured,
    }) + '\n'
  );
  process.exit(1);
});
"##;
