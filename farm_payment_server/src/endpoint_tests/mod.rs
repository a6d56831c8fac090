mod helpers;
mod mocks;
mod scenarios;
mod webhook;
